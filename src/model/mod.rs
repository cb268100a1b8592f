mod file;
mod folder;
mod notification;
mod share;
mod user;

pub use file::{parse_size, File, FileMetadata, FileUpdate, Role, Upload};
pub use folder::{parse_tags, Folder, FolderUpdate, NewFolder, DEFAULT_COLOR};
pub use notification::{unread_count, Notification, NotificationType};
pub use share::{NewShare, Permission, Share, ShareKind};
pub use user::{RefreshedToken, RegisterRequest, SignupForm, TokenPair, User, UserUpdate};
