use std::io::{Error, ErrorKind, SeekFrom};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

use webdav_handler::davpath::DavPath;
use webdav_handler::fs::{
    DavDirEntry, DavFile, DavFileSystem, DavMetaData, FsError, FsFuture, FsResult, FsStream,
    OpenOptions, ReadDirMeta,
};

use crate::model::{File, Folder};
use crate::store::FileStore;
use bytes::{Buf, Bytes};
use futures::{future, future::FutureExt};
use lru::LruCache;
use uuid::Uuid;

/// Virtual directory holding files other users shared with us.
pub const SHARED_DIR: &str = "Shared With Me";

/// Read-only view of the dashboard: folders become directories, documents
/// become files whose content is fetched from their `file_url` on open.
#[derive(Clone)]
pub struct DocumentFs {
    store: Arc<Mutex<FileStore>>,
    cache: Arc<Mutex<LruCache<Uuid, Bytes>>>,
}

#[derive(Debug, Clone)]
enum Node {
    Root,
    Shared,
    Folder(Folder),
    File(File),
}

#[derive(Debug, Clone)]
struct DocEntry {
    mtime: SystemTime,
    crtime: SystemTime,
    is_dir: bool,
    name: Vec<u8>,
    size: u64,
}

#[derive(Debug)]
struct DocFile {
    meta: DocEntry,
    data: Bytes,
    pos: usize,
}

impl DocumentFs {
    pub fn new(store: Arc<Mutex<FileStore>>, cache_size: usize) -> Box<DocumentFs> {
        Box::new(DocumentFs {
            store,
            cache: Arc::new(Mutex::new(LruCache::new(cache_size))),
        })
    }

    async fn lookup(&self, path: &[u8]) -> FsResult<Node> {
        let mut store = self.store.lock().await;
        if store.needs_load() {
            store.load().await.map_err(|_| FsError::GeneralFailure)?;
        }
        resolve(&store, path)
    }

    async fn content(&self, file: &File) -> FsResult<Bytes> {
        if let Some(data) = self.cache.lock().await.get(&file.id) {
            return Ok(data.clone());
        }

        let url = match &file.file_url {
            Some(url) => url,
            None => return Ok(Bytes::new()),
        };
        let client = self.store.lock().await.client().clone();
        let data = client.download(url).await.map_err(|e| {
            tracing::error!("download of {} failed: {}", file.name, e);
            FsError::GeneralFailure
        })?;
        self.cache.lock().await.put(file.id, data.clone());
        Ok(data)
    }
}

impl DavFileSystem for DocumentFs {
    fn open<'a>(&'a self, path: &'a DavPath, options: OpenOptions) -> FsFuture<Box<dyn DavFile>> {
        async move {
            if options.write || options.append || options.create || options.create_new {
                return Err(FsError::Forbidden);
            }
            let file = match self.lookup(path.as_bytes()).await? {
                Node::File(file) => file,
                _ => return Err(FsError::Forbidden),
            };
            let data = self.content(&file).await?;
            let mut meta = Node::File(file).as_dirent(&file_name(path.as_bytes()));
            meta.size = data.len() as u64;
            Ok(Box::new(DocFile { meta, data, pos: 0 }) as Box<dyn DavFile>)
        }
        .boxed()
    }

    fn read_dir<'a>(
        &'a self,
        path: &'a DavPath,
        _meta: ReadDirMeta,
    ) -> FsFuture<FsStream<Box<dyn DavDirEntry>>> {
        async move {
            let node = self.lookup(path.as_bytes()).await?;
            let store = self.store.lock().await;
            let children = children(&store, &node)?;

            let mut v: Vec<Box<dyn DavDirEntry>> = Vec::new();
            for child in children {
                let name = child.name().as_bytes().to_vec();
                v.push(Box::new(child.as_dirent(&name)));
            }
            let strm = futures::stream::iter(v.into_iter());
            Ok(Box::pin(strm) as FsStream<Box<dyn DavDirEntry>>)
        }
        .boxed()
    }

    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<Box<dyn DavMetaData>> {
        async move {
            let node = self.lookup(path.as_bytes()).await?;
            let meta = node.as_dirent(&file_name(path.as_bytes()));
            Ok(Box::new(meta) as Box<dyn DavMetaData>)
        }
        .boxed()
    }
}

/// Map a request path onto the store. Names are matched exactly; the first
/// match wins when two entries share a name.
fn resolve(store: &FileStore, path: &[u8]) -> FsResult<Node> {
    let segs: Vec<String> = path
        .split(|&c| c == b'/')
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();

    match segs.as_slice() {
        [] => Ok(Node::Root),
        [dir] if dir == SHARED_DIR => Ok(Node::Shared),
        [name] => {
            if let Some(folder) = store.folders().iter().find(|f| &f.name == name) {
                return Ok(Node::Folder(folder.clone()));
            }
            root_files(store)
                .into_iter()
                .find(|f| &f.name == name)
                .map(|f| Node::File(f.clone()))
                .ok_or(FsError::NotFound)
        }
        [dir, name] if dir == SHARED_DIR => store
            .shared_files()
            .into_iter()
            .find(|f| &f.name == name)
            .map(|f| Node::File(f.clone()))
            .ok_or(FsError::NotFound),
        [dir, name] => {
            let folder = store
                .folders()
                .iter()
                .find(|f| &f.name == dir)
                .ok_or(FsError::NotFound)?;
            store
                .files_in_folder(folder.id)
                .into_iter()
                .find(|f| &f.name == name)
                .map(|f| Node::File(f.clone()))
                .ok_or(FsError::NotFound)
        }
        _ => Err(FsError::NotFound),
    }
}

fn children(store: &FileStore, node: &Node) -> FsResult<Vec<Node>> {
    match node {
        Node::Root => {
            let mut v: Vec<Node> = store.folders().iter().cloned().map(Node::Folder).collect();
            v.push(Node::Shared);
            v.extend(file_nodes(root_files(store)));
            Ok(v)
        }
        Node::Shared => Ok(file_nodes(store.shared_files())),
        Node::Folder(folder) => Ok(file_nodes(store.files_in_folder(folder.id))),
        Node::File(_) => Err(FsError::Forbidden),
    }
}

fn file_nodes(files: Vec<&File>) -> Vec<Node> {
    files.into_iter().map(|f| Node::File(f.clone())).collect()
}

// unfiled documents that are ours; shared ones live under SHARED_DIR
fn root_files(store: &FileStore) -> Vec<&File> {
    store
        .files()
        .iter()
        .filter(|f| f.folder.is_none())
        .filter(|f| !f.role_for(store.user()).map_or(false, |r| r.is_shared()))
        .collect()
}

impl DavDirEntry for DocEntry {
    fn name(&self) -> Vec<u8> {
        self.name.clone()
    }

    fn metadata<'a>(&'a self) -> FsFuture<Box<dyn DavMetaData>> {
        let meta = (*self).clone();
        Box::pin(future::ok(Box::new(meta) as Box<dyn DavMetaData>))
    }
}

impl DavFile for DocFile {
    fn metadata<'a>(&'a mut self) -> FsFuture<Box<dyn DavMetaData>> {
        let meta = self.meta.clone();
        Box::pin(future::ok(Box::new(meta) as Box<dyn DavMetaData>))
    }

    fn write_buf<'a>(&'a mut self, _buf: Box<dyn Buf + Send>) -> FsFuture<()> {
        async move { Err(Error::new(ErrorKind::PermissionDenied, "read only fs").into()) }.boxed()
    }

    fn write_bytes(&mut self, _buf: Bytes) -> FsFuture<()> {
        async move { Err(Error::new(ErrorKind::PermissionDenied, "read only fs").into()) }.boxed()
    }

    fn read_bytes(&mut self, count: usize) -> FsFuture<Bytes> {
        let curlen = self.data.len();
        let start = self.pos.min(curlen);
        let end = self.pos.saturating_add(count).min(curlen);
        self.pos += end - start;
        future::ok(self.data.slice(start..end)).boxed()
    }

    fn seek(&mut self, pos: SeekFrom) -> FsFuture<u64> {
        let (start, offset): (u64, i64) = match pos {
            SeekFrom::Start(npos) => {
                self.pos = npos as usize;
                return future::ok(npos).boxed();
            }
            SeekFrom::Current(npos) => (self.pos as u64, npos),
            SeekFrom::End(npos) => (self.data.len() as u64, npos),
        };
        let npos = if offset < 0 {
            start.checked_sub(offset.unsigned_abs())
        } else {
            start.checked_add(offset as u64)
        };
        match npos {
            Some(npos) => {
                self.pos = npos as usize;
                future::ok(npos).boxed()
            }
            None => async move {
                Err(Error::new(ErrorKind::InvalidInput, "invalid seek").into())
            }
            .boxed(),
        }
    }

    fn flush(&mut self) -> FsFuture<()> {
        future::ok(()).boxed()
    }
}

impl DavMetaData for DocEntry {
    fn len(&self) -> u64 {
        self.size
    }

    fn modified(&self) -> FsResult<SystemTime> {
        Ok(self.mtime)
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn created(&self) -> FsResult<SystemTime> {
        Ok(self.crtime)
    }
}

impl Node {
    fn name(&self) -> &str {
        match self {
            Node::Root => "",
            Node::Shared => SHARED_DIR,
            Node::Folder(folder) => &folder.name,
            Node::File(file) => &file.name,
        }
    }

    // helper to create a DocEntry from a node.
    fn as_dirent(&self, name: &[u8]) -> DocEntry {
        let (is_dir, size, mtime, crtime) = match self {
            Node::Root | Node::Shared => (true, 0, SystemTime::now(), SystemTime::now()),
            Node::Folder(folder) => {
                let crtime = SystemTime::from(folder.created_at);
                let mtime = folder.updated_at.map(SystemTime::from).unwrap_or(crtime);
                (true, 0, mtime, crtime)
            }
            Node::File(file) => {
                let crtime = SystemTime::from(file.created_at);
                (false, file.size_bytes().unwrap_or(0), crtime, crtime)
            }
        };
        DocEntry {
            name: name.to_vec(),
            mtime,
            crtime,
            is_dir,
            size,
        }
    }
}

// helper
fn file_name(path: &[u8]) -> Vec<u8> {
    path.split(|&c| c == b'/')
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or(b"")
        .to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::token::MemoryTokenStore;
    use serde_json::json;

    const ME: i64 = 1;

    fn store() -> (FileStore, Uuid) {
        let client =
            ApiClient::new("http://127.0.0.1:9/api", Arc::new(MemoryTokenStore::new())).unwrap();
        let mut store = FileStore::new(client, Some(ME));
        let folder: Folder = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "name": "Taxes",
            "owner": ME,
            "created_at": "2024-07-01T10:00:00Z",
        }))
        .unwrap();
        let folder_id = folder.id;
        let file = |name: &str, folder: Option<Uuid>, owner: i64| -> File {
            serde_json::from_value(json!({
                "id": Uuid::new_v4(),
                "name": name,
                "size": "1.00 KB",
                "folder": folder,
                "owner": owner,
                "shares": [{"id": 1, "shared_with": ME, "permission": "VIEW",
                            "created_at": "2024-07-02T10:00:00Z"}],
                "created_at": "2024-07-01T10:00:00Z",
            }))
            .unwrap()
        };
        store.replace_all(
            vec![folder],
            vec![
                file("2024.pdf", Some(folder_id), ME),
                file("notes.txt", None, ME),
                file("from-bob.docx", None, 2),
            ],
        );
        (store, folder_id)
    }

    fn names(nodes: Vec<Node>) -> Vec<String> {
        nodes.iter().map(|n| n.name().to_string()).collect()
    }

    #[test]
    fn root_lists_folders_shared_dir_and_own_files() {
        let (store, _) = store();
        let root = children(&store, &Node::Root).unwrap();
        assert_eq!(names(root), vec!["Taxes", SHARED_DIR, "notes.txt"]);
    }

    #[test]
    fn shared_files_live_under_shared_dir() {
        let (store, _) = store();
        let shared = children(&store, &Node::Shared).unwrap();
        assert_eq!(names(shared), vec!["from-bob.docx"]);
        assert!(matches!(
            resolve(&store, b"/Shared With Me/from-bob.docx"),
            Ok(Node::File(_))
        ));
        assert!(matches!(
            resolve(&store, b"/from-bob.docx"),
            Err(FsError::NotFound)
        ));
    }

    #[test]
    fn resolves_folder_paths() {
        let (store, folder_id) = store();
        match resolve(&store, b"/Taxes/").unwrap() {
            Node::Folder(f) => assert_eq!(f.id, folder_id),
            other => panic!("unexpected {:?}", other),
        }
        match resolve(&store, b"/Taxes/2024.pdf").unwrap() {
            Node::File(f) => assert_eq!(f.folder, Some(folder_id)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(resolve(&store, b"/Taxes/2024.pdf/x").is_err());
        assert!(children(&store, &Node::Root).is_ok());
    }

    #[test]
    fn file_entries_use_parsed_size() {
        let (store, _) = store();
        let node = resolve(&store, b"/notes.txt").unwrap();
        let entry = node.as_dirent(b"notes.txt");
        assert!(!entry.is_dir);
        assert_eq!(entry.len(), 1024);
    }

    #[test]
    fn reads_and_seeks_within_content() {
        let meta = Node::Root.as_dirent(b"");
        let mut file = DocFile {
            meta,
            data: Bytes::from_static(b"hello world"),
            pos: 0,
        };
        futures::executor::block_on(async {
            assert_eq!(file.read_bytes(5).await.unwrap(), Bytes::from_static(b"hello"));
            assert_eq!(file.seek(SeekFrom::End(-5)).await.unwrap(), 6);
            assert_eq!(file.read_bytes(100).await.unwrap(), Bytes::from_static(b"world"));
            assert!(file.read_bytes(1).await.unwrap().is_empty());
            assert!(file.seek(SeekFrom::Current(-100)).await.is_err());
        });
    }

    #[test]
    fn seek_past_u64_range_is_rejected() {
        let mut file = DocFile {
            meta: Node::Root.as_dirent(b""),
            data: Bytes::from_static(b"hello"),
            pos: 0,
        };
        futures::executor::block_on(async {
            assert_eq!(file.seek(SeekFrom::End(i64::MAX)).await.unwrap(), 5 + i64::MAX as u64);
            assert!(file.seek(SeekFrom::Current(i64::MAX)).await.is_err());
            assert!(file.seek(SeekFrom::End(i64::MIN)).await.is_err());
            assert_eq!(file.seek(SeekFrom::Current(0)).await.unwrap(), 5 + i64::MAX as u64);
        });
    }
}
