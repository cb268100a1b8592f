use crate::error::{Error, Result};
use crate::model::{
    File, FileUpdate, Folder, FolderUpdate, NewFolder, NewShare, Notification, RefreshedToken,
    RegisterRequest, Share, ShareKind, TokenPair, Upload, User, UserUpdate,
};
use crate::token::TokenStore;
use bytes::Bytes;
use http::StatusCode;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Thin client over the document REST API.
///
/// Every request carries the stored access token. A 401 triggers a single
/// refresh of the access token followed by one retry; when the refresh fails
/// both tokens are dropped and the caller gets [`Error::SessionExpired`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
    tokens: Arc<dyn TokenStore>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient").field("base", &self.base).finish()
    }
}

impl ApiClient {
    pub fn new(base: &str, tokens: Arc<dyn TokenStore>) -> Result<ApiClient> {
        let client = Client::builder().build()?;
        Ok(ApiClient {
            client,
            base: base.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.tokens.access() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let res = self.authorized(build(&self.client)).send().await?;
        if res.status() != StatusCode::UNAUTHORIZED {
            return check(res).await;
        }

        tracing::info!("access token rejected, refreshing");
        self.refresh_access().await?;
        let res = self.authorized(build(&self.client)).send().await?;
        check(res).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let res = self.send(|c| c.get(&url)).await?;
        Ok(res.json().await?)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let res = self.send(|c| c.post(&url).json(body)).await?;
        Ok(res.json().await?)
    }

    async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let res = self.send(|c| c.patch(&url).json(body)).await?;
        Ok(res.json().await?)
    }

    async fn post_empty(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.send(|c| c.post(&url)).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.send(|c| c.delete(&url)).await?;
        Ok(())
    }

    /// Swap the refresh token for a new access token.
    pub async fn refresh_access(&self) -> Result<()> {
        let outcome = match self.tokens.refresh() {
            Some(refresh) => self.refresh(&refresh).await,
            None => Err(Error::NotAuthenticated),
        };
        match outcome {
            Ok(token) => match token.refresh {
                Some(refresh) => self.tokens.set_pair(&token.access, &refresh),
                None => self.tokens.set_access(&token.access),
            },
            Err(e) => {
                tracing::error!("token refresh failed: {}", e);
                self.tokens.clear()?;
                Err(Error::SessionExpired)
            }
        }
    }

    // auth

    pub async fn register(&self, req: &RegisterRequest) -> Result<()> {
        let res = self
            .client
            .post(self.url("auth/register/"))
            .json(req)
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let res = self
            .client
            .post(self.url("auth/login/"))
            .json(&json!({ "username": email, "password": password }))
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }

    pub async fn refresh(&self, refresh: &str) -> Result<RefreshedToken> {
        let res = self
            .client
            .post(self.url("auth/refresh/"))
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }

    pub async fn get_user(&self) -> Result<User> {
        self.get_json("auth/user/").await
    }

    pub async fn update_user(&self, update: &UserUpdate) -> Result<User> {
        self.patch_json("auth/user/", update).await
    }

    // folders

    pub async fn list_folders(&self) -> Result<Vec<Folder>> {
        self.get_json("folders/").await
    }

    pub async fn create_folder(&self, folder: &NewFolder) -> Result<Folder> {
        let body = json!({
            "name": folder.name,
            "color": folder.color,
            "parent": Value::Null,
            "tags": folder.tags,
        });
        self.post_json("folders/", &body).await
    }

    pub async fn get_folder(&self, id: Uuid) -> Result<Folder> {
        self.get_json(&format!("folders/{}/", id)).await
    }

    pub async fn update_folder(&self, id: Uuid, update: &FolderUpdate) -> Result<Folder> {
        self.patch_json(&format!("folders/{}/", id), update).await
    }

    pub async fn delete_folder(&self, id: Uuid) -> Result<()> {
        self.delete(&format!("folders/{}/", id)).await
    }

    // files

    pub async fn list_files(&self) -> Result<Vec<File>> {
        self.get_json("files/").await
    }

    pub async fn upload_file(&self, upload: &Upload) -> Result<File> {
        let url = self.url("files/");
        let res = self
            .send(|c| c.post(&url).multipart(upload_form(upload)))
            .await?;
        Ok(res.json().await?)
    }

    pub async fn get_file(&self, id: Uuid) -> Result<File> {
        self.get_json(&format!("files/{}/", id)).await
    }

    pub async fn update_file(&self, id: Uuid, update: &FileUpdate) -> Result<File> {
        self.patch_json(&format!("files/{}/", id), update).await
    }

    pub async fn delete_file(&self, id: Uuid) -> Result<()> {
        self.delete(&format!("files/{}/", id)).await
    }

    pub async fn lock_file(&self, id: Uuid) -> Result<()> {
        self.post_empty(&format!("files/{}/lock/", id)).await
    }

    pub async fn unlock_file(&self, id: Uuid) -> Result<()> {
        self.post_empty(&format!("files/{}/unlock/", id)).await
    }

    pub async fn save_content(&self, id: Uuid, content: &str) -> Result<()> {
        let url = self.url(&format!("files/{}/save_content/", id));
        let body = json!({ "content": content });
        self.send(|c| c.post(&url).json(&body)).await?;
        Ok(())
    }

    /// Fetch the stored document behind a file's absolute `file_url`.
    ///
    /// Credentials only go along when the URL shares the API's origin; media
    /// on any other host is fetched anonymously and never triggers a refresh.
    pub async fn download(&self, file_url: &str) -> Result<Bytes> {
        tracing::info!("download: {}", file_url);
        let res = if self.same_origin(file_url) {
            self.send(|c| c.get(file_url)).await?
        } else {
            check(self.client.get(file_url).send().await?).await?
        };
        Ok(res.bytes().await?)
    }

    fn same_origin(&self, url: &str) -> bool {
        match (Url::parse(url), Url::parse(&self.base)) {
            (Ok(url), Ok(base)) => url.origin() == base.origin(),
            _ => false,
        }
    }

    // shares

    pub async fn share(&self, share: &NewShare) -> Result<Share> {
        let path = format!("shares/{}/", share.kind.as_str());
        self.post_json(&path, &share.payload()).await
    }

    pub async fn list_shares(&self, kind: ShareKind) -> Result<Vec<Share>> {
        self.get_json(&format!("shares/{}/", kind.as_str())).await
    }

    pub async fn revoke_share(&self, kind: ShareKind, id: i64) -> Result<()> {
        self.delete(&format!("shares/{}/{}/", kind.as_str(), id))
            .await
    }

    // notifications

    pub async fn list_notifications(&self) -> Result<Vec<Notification>> {
        self.get_json("notifications/").await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.post_empty("notifications/mark_all_read/").await
    }
}

async fn check(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(Error::from_status(status, &body))
}

fn upload_form(upload: &Upload) -> Form {
    let file = Part::bytes(upload.content.clone()).file_name(upload.file_name.to_string());
    let folder = upload.folder.map(|id| id.to_string()).unwrap_or_default();
    let mut form = Form::new()
        .part("file", file)
        .text("name", upload.file_name.to_string())
        .text("folder", folder)
        .text("description", upload.description.to_string())
        .text("tags", Value::from(upload.tags.clone()).to_string());
    if let Some(author) = &upload.author {
        form = form.text("metadata", json!({ "author": author }).to_string());
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:8000/api/", Arc::new(MemoryTokenStore::new())).unwrap()
    }

    #[test]
    fn credentials_stay_on_the_api_origin() {
        let client = client();
        assert!(client.same_origin("http://localhost:8000/media/lease.docx"));
        assert!(!client.same_origin("http://localhost:9000/media/lease.docx"));
        assert!(!client.same_origin("https://localhost:8000/media/lease.docx"));
        assert!(!client.same_origin("https://cdn.example.org/media/lease.docx"));
        assert!(!client.same_origin("/media/lease.docx"));
    }
}
