use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::model::{File, FileUpdate, Folder, FolderUpdate, NewFolder, Role, Upload};
use uuid::Uuid;

/// Local mirror of the folders and files visible to the signed-in user.
///
/// Every mutation goes to the backend first and only touches the local lists
/// once the call succeeded. Nothing is reconciled against edits made by other
/// sessions; a fresh [`FileStore::load`] is the only way to catch up.
#[derive(Debug)]
pub struct FileStore {
    client: ApiClient,
    user: Option<i64>,
    folders: Vec<Folder>,
    files: Vec<File>,
    loading: bool,
    load_failed: bool,
}

impl FileStore {
    pub fn new(client: ApiClient, user: Option<i64>) -> FileStore {
        FileStore {
            client,
            user,
            folders: Vec::new(),
            files: Vec::new(),
            loading: true,
            load_failed: false,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn user(&self) -> Option<i64> {
        self.user
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True until a `load()` has succeeded; a failed load leaves it set.
    pub fn needs_load(&self) -> bool {
        self.loading || self.load_failed
    }

    /// Fetch folders and files together. Either list failing leaves both empty.
    pub async fn load(&mut self) -> Result<()> {
        tracing::info!("loading folders and files");
        let fetched = futures::try_join!(self.client.list_folders(), self.client.list_files());
        match fetched {
            Ok((folders, files)) => {
                tracing::info!("loaded {} folders, {} files", folders.len(), files.len());
                self.replace_all(folders, files);
                Ok(())
            }
            Err(e) => {
                tracing::error!("loading folders and files failed: {}", e);
                self.replace_all(Vec::new(), Vec::new());
                self.load_failed = true;
                Err(e)
            }
        }
    }

    /// Overwrite both lists wholesale.
    pub fn replace_all(&mut self, folders: Vec<Folder>, files: Vec<File>) {
        self.folders = folders;
        self.files = files;
        self.loading = false;
        self.load_failed = false;
    }

    // queries

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn folder(&self, id: Uuid) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn file(&self, id: Uuid) -> Option<&File> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Files the current user owns.
    pub fn my_files(&self) -> Vec<&File> {
        self.files
            .iter()
            .filter(|f| f.role_for(self.user) == Some(Role::Owner))
            .collect()
    }

    /// Files someone else shared with the current user.
    pub fn shared_files(&self) -> Vec<&File> {
        self.files
            .iter()
            .filter(|f| f.role_for(self.user).map_or(false, |r| r.is_shared()))
            .collect()
    }

    pub fn files_in_folder(&self, folder: Uuid) -> Vec<&File> {
        self.files
            .iter()
            .filter(|f| f.folder == Some(folder))
            .collect()
    }

    pub fn folder_file_count(&self, folder: Uuid) -> usize {
        self.files.iter().filter(|f| f.folder == Some(folder)).count()
    }

    /// Files whose name, tags, description or metadata contain `query`.
    /// A blank query matches everything.
    pub fn search(&self, query: &str) -> Vec<&File> {
        let query = query.trim();
        self.files
            .iter()
            .filter(|f| query.is_empty() || f.matches(query))
            .collect()
    }

    // folder mutations

    pub async fn create_folder(&mut self, folder: &NewFolder) -> Result<&Folder> {
        let created = self.client.create_folder(folder).await.map_err(|e| {
            tracing::error!("creating folder {} failed: {}", folder.name, e);
            e
        })?;
        self.folders.push(created);
        self.folders.last().ok_or_else(|| Error::NotFound(folder.name.to_string()))
    }

    pub async fn update_folder(&mut self, id: Uuid, update: &FolderUpdate) -> Result<()> {
        let updated = self.client.update_folder(id, update).await.map_err(|e| {
            tracing::error!("updating folder {} failed: {}", id, e);
            e
        })?;
        self.replace_folder(updated);
        Ok(())
    }

    /// Delete a folder, then drop it and its files from local state.
    pub async fn delete_folder(&mut self, id: Uuid) -> Result<()> {
        self.client.delete_folder(id).await.map_err(|e| {
            tracing::error!("deleting folder {} failed: {}", id, e);
            e
        })?;
        self.remove_folder(id);
        Ok(())
    }

    // file mutations

    pub async fn upload_file(&mut self, upload: &Upload) -> Result<&File> {
        let created = self.client.upload_file(upload).await.map_err(|e| {
            tracing::error!("uploading {} failed: {}", upload.file_name, e);
            e
        })?;
        self.files.push(created);
        self.files
            .last()
            .ok_or_else(|| Error::NotFound(upload.file_name.to_string()))
    }

    pub async fn update_file(&mut self, id: Uuid, update: &FileUpdate) -> Result<()> {
        let updated = self.client.update_file(id, update).await.map_err(|e| {
            tracing::error!("updating file {} failed: {}", id, e);
            e
        })?;
        self.replace_file(updated);
        Ok(())
    }

    pub async fn delete_file(&mut self, id: Uuid) -> Result<()> {
        self.client.delete_file(id).await.map_err(|e| {
            tracing::error!("deleting file {} failed: {}", id, e);
            e
        })?;
        self.files.retain(|f| f.id != id);
        Ok(())
    }

    pub async fn lock_file(&mut self, id: Uuid) -> Result<()> {
        self.client.lock_file(id).await.map_err(|e| {
            tracing::error!("locking file {} failed: {}", id, e);
            e
        })?;
        self.set_locked_by(id, self.user);
        Ok(())
    }

    pub async fn unlock_file(&mut self, id: Uuid) -> Result<()> {
        self.client.unlock_file(id).await.map_err(|e| {
            tracing::error!("unlocking file {} failed: {}", id, e);
            e
        })?;
        self.set_locked_by(id, None);
        Ok(())
    }

    pub async fn save_content(&self, id: Uuid, content: &str) -> Result<()> {
        self.client.save_content(id, content).await.map_err(|e| {
            tracing::error!("saving file {} failed: {}", id, e);
            e
        })
    }

    fn replace_folder(&mut self, folder: Folder) {
        if let Some(slot) = self.folders.iter_mut().find(|f| f.id == folder.id) {
            *slot = folder;
        }
    }

    fn remove_folder(&mut self, id: Uuid) {
        self.folders.retain(|f| f.id != id);
        self.files.retain(|f| f.folder != Some(id));
    }

    fn replace_file(&mut self, file: File) {
        if let Some(slot) = self.files.iter_mut().find(|f| f.id == file.id) {
            *slot = file;
        }
    }

    fn set_locked_by(&mut self, id: Uuid, user: Option<i64>) {
        if let Some(file) = self.files.iter_mut().find(|f| f.id == id) {
            file.locked_by = user;
            if user.is_none() {
                file.locked_by_details = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;
    use std::sync::Arc;

    const ME: i64 = 1;

    fn folder(name: &str) -> Folder {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": name,
            "owner": ME,
            "created_at": "2024-07-01T10:00:00Z",
        }))
        .unwrap()
    }

    fn file(name: &str, folder: Option<Uuid>, role: Option<Role>) -> File {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": name,
            "folder": folder,
            "owner": ME,
            "role": role,
            "created_at": "2024-07-01T10:00:00Z",
        }))
        .unwrap()
    }

    fn store() -> FileStore {
        let client =
            ApiClient::new("http://127.0.0.1:9/api", Arc::new(MemoryTokenStore::new())).unwrap();
        FileStore::new(client, Some(ME))
    }

    #[test]
    fn new_store_is_loading_and_empty() {
        let store = store();
        assert!(store.is_loading());
        assert!(store.needs_load());
        assert!(store.files().is_empty());
    }

    #[test]
    fn partitions_by_role() {
        let mut store = store();
        store.files = vec![
            file("mine.pdf", None, Some(Role::Owner)),
            file("edit.pdf", None, Some(Role::Editor)),
            file("view.pdf", None, Some(Role::View)),
        ];
        let mine: Vec<_> = store.my_files().iter().map(|f| f.name.as_str()).collect();
        let shared: Vec<_> = store
            .shared_files()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(mine, vec!["mine.pdf"]);
        assert_eq!(shared, vec!["edit.pdf", "view.pdf"]);
    }

    #[test]
    fn missing_role_falls_back_to_ownership() {
        let mut store = store();
        store.files = vec![file("plain.txt", None, None)];
        assert_eq!(store.my_files().len(), 1);
        assert!(store.shared_files().is_empty());
    }

    #[test]
    fn removing_folder_drops_its_files() {
        let mut store = store();
        let taxes = folder("Taxes");
        let other = folder("Other");
        store.files = vec![
            file("2023.pdf", Some(taxes.id), None),
            file("2024.pdf", Some(taxes.id), None),
            file("cv.pdf", Some(other.id), None),
            file("loose.txt", None, None),
        ];
        store.folders = vec![taxes.clone(), other.clone()];

        assert_eq!(store.folder_file_count(taxes.id), 2);
        store.remove_folder(taxes.id);

        assert!(store.folder(taxes.id).is_none());
        assert_eq!(store.folder_file_count(taxes.id), 0);
        let names: Vec<_> = store.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["cv.pdf", "loose.txt"]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut store = store();
        let a = folder("A");
        let b = folder("B");
        store.folders = vec![a.clone(), b.clone()];

        let mut renamed = a.clone();
        renamed.name = "A2".to_string();
        store.replace_folder(renamed);

        assert_eq!(store.folders()[0].name, "A2");
        assert_eq!(store.folders()[1].name, "B");
    }

    #[test]
    fn search_is_case_insensitive() {
        let mut store = store();
        store.files = vec![
            file("Lease_Agreement.pdf", None, None),
            file("Invoice-04.pdf", None, None),
        ];
        let hits: Vec<_> = store
            .search("lease")
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(hits, vec!["Lease_Agreement.pdf"]);
        assert_eq!(store.search("  ").len(), 2);
    }

    #[test]
    fn lock_flag_follows_local_updates() {
        let mut store = store();
        let doc = file("doc.docx", None, None);
        let id = doc.id;
        store.files = vec![doc];

        store.set_locked_by(id, Some(ME));
        assert_eq!(store.file(id).and_then(|f| f.locked_by), Some(ME));
        store.set_locked_by(id, None);
        assert_eq!(store.file(id).and_then(|f| f.locked_by), None);
    }

    #[tokio::test]
    async fn failed_load_leaves_state_empty() {
        let mut store = store();
        store.folders = vec![folder("stale")];
        assert!(store.load().await.is_err());
        assert!(!store.is_loading());
        assert!(store.needs_load());
        assert!(store.folders().is_empty());

        store.replace_all(Vec::new(), Vec::new());
        assert!(!store.needs_load());
    }
}
