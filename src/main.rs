use chrono::{DateTime, Utc};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use docdesk::config::{Config, DEFAULT_CONFIG_FILE};
use docdesk::dav::DocumentFs;
use docdesk::model::{
    parse_tags, unread_count, File, Folder, NewFolder, NewShare, Permission, Role, ShareKind,
    SignupForm, Upload,
};
use docdesk::{ApiClient, EditSession, Error, FileStore, FileTokenStore, LockState, Result, Session};
use std::convert::Infallible;
use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use webdav_handler::{fakels::FakeLs, DavHandler};

fn cli() -> App<'static, 'static> {
    let file_arg = || {
        Arg::with_name("file")
            .help("file id or name")
            .required(true)
    };
    App::new("docdesk")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Manage folders, documents and shares on a docdesk server")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("config file (default: docdesk.json)"),
        )
        .arg(
            Arg::with_name("server")
                .short("s")
                .long("server")
                .takes_value(true)
                .help("API base URL, overrides the config file"),
        )
        .subcommand(
            SubCommand::with_name("login")
                .about("Log in and store the session tokens")
                .arg(Arg::with_name("email").required(true))
                .arg(
                    Arg::with_name("password")
                        .long("password")
                        .takes_value(true)
                        .env("DOCDESK_PASSWORD")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("signup")
                .about("Create an account and log in")
                .arg(Arg::with_name("name").required(true).help("full name"))
                .arg(Arg::with_name("email").required(true))
                .arg(
                    Arg::with_name("password")
                        .long("password")
                        .takes_value(true)
                        .env("DOCDESK_PASSWORD")
                        .required(true),
                )
                .arg(Arg::with_name("contact").long("contact").takes_value(true)),
        )
        .subcommand(SubCommand::with_name("logout").about("Forget the stored session"))
        .subcommand(SubCommand::with_name("whoami").about("Show the signed-in user"))
        .subcommand(
            SubCommand::with_name("ls")
                .about("List folders and documents")
                .arg(Arg::with_name("folder").help("only documents in this folder"))
                .arg(Arg::with_name("mine").long("mine").conflicts_with("shared"))
                .arg(Arg::with_name("shared").long("shared"))
                .arg(Arg::with_name("search").long("search").takes_value(true)),
        )
        .subcommand(
            SubCommand::with_name("mkdir")
                .about("Create a folder")
                .arg(Arg::with_name("name").required(true))
                .arg(Arg::with_name("color").long("color").takes_value(true))
                .arg(
                    Arg::with_name("tags")
                        .long("tags")
                        .takes_value(true)
                        .help("comma separated"),
                ),
        )
        .subcommand(
            SubCommand::with_name("rmdir")
                .about("Delete a folder and its documents")
                .arg(Arg::with_name("folder").required(true)),
        )
        .subcommand(
            SubCommand::with_name("upload")
                .about("Upload a document")
                .arg(Arg::with_name("path").required(true))
                .arg(Arg::with_name("folder").long("folder").takes_value(true))
                .arg(Arg::with_name("description").long("description").takes_value(true))
                .arg(Arg::with_name("tags").long("tags").takes_value(true))
                .arg(Arg::with_name("author").long("author").takes_value(true)),
        )
        .subcommand(
            SubCommand::with_name("rm")
                .about("Delete a document")
                .arg(file_arg()),
        )
        .subcommand(
            SubCommand::with_name("cat")
                .about("Print a document's content")
                .arg(file_arg()),
        )
        .subcommand(
            SubCommand::with_name("edit")
                .about("Lock a document, replace its content from a local file, unlock")
                .arg(file_arg())
                .arg(Arg::with_name("source").required(true)),
        )
        .subcommand(
            SubCommand::with_name("unlock")
                .about("Release your lock, or break another user's lock as owner")
                .arg(file_arg()),
        )
        .subcommand(
            SubCommand::with_name("share")
                .about("Share a file or folder by email")
                .arg(
                    Arg::with_name("kind")
                        .required(true)
                        .possible_values(&["file", "folder"]),
                )
                .arg(Arg::with_name("target").required(true))
                .arg(Arg::with_name("email").required(true))
                .arg(
                    Arg::with_name("permission")
                        .long("permission")
                        .takes_value(true)
                        .possible_values(&["VIEW", "EDIT", "view", "edit"])
                        .default_value("VIEW"),
                )
                .arg(
                    Arg::with_name("expires")
                        .long("expires")
                        .takes_value(true)
                        .help("RFC 3339 timestamp"),
                )
                .arg(Arg::with_name("message").long("message").takes_value(true)),
        )
        .subcommand(
            SubCommand::with_name("shares")
                .about("List shares you created or received")
                .arg(
                    Arg::with_name("kind")
                        .possible_values(&["file", "folder"])
                        .default_value("file"),
                ),
        )
        .subcommand(
            SubCommand::with_name("revoke")
                .about("Revoke a share")
                .arg(
                    Arg::with_name("kind")
                        .required(true)
                        .possible_values(&["file", "folder"]),
                )
                .arg(Arg::with_name("id").required(true)),
        )
        .subcommand(
            SubCommand::with_name("notifications")
                .about("List notifications")
                .arg(Arg::with_name("mark-read").long("mark-read")),
        )
        .subcommand(
            SubCommand::with_name("serve")
                .about("Serve your documents as a read-only WebDAV share"),
        )
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let matches = cli().get_matches();
    if let Err(e) = run(&matches).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(matches: &ArgMatches<'_>) -> Result<()> {
    let mut config = Config::load(matches.value_of("config").unwrap_or(DEFAULT_CONFIG_FILE))?;
    if let Some(server) = matches.value_of("server") {
        config.server = server.to_string();
        config.validate()?;
    }

    let tokens = Arc::new(FileTokenStore::open(&config.token_file)?);
    let client = ApiClient::new(&config.server, tokens)?;
    let mut session = Session::new(client.clone());

    match matches.subcommand() {
        ("login", Some(m)) => {
            let user = session
                .login(arg(m, "email")?, arg(m, "password")?)
                .await?;
            println!("Logged in as {}", user.display_name());
        }
        ("signup", Some(m)) => {
            let form = SignupForm {
                name: arg(m, "name")?.to_string(),
                email: arg(m, "email")?.to_string(),
                password: arg(m, "password")?.to_string(),
                contact: m.value_of("contact").map(str::to_string),
            };
            let user = session.signup(&form).await?;
            println!("Welcome, {}", user.display_name());
        }
        ("logout", _) => {
            session.logout()?;
            println!("Logged out");
        }
        ("whoami", _) => {
            if session.restore().await? {
                if let Some(user) = session.user() {
                    println!("{} <{}> (id {})", user.display_name(), user.email, user.id);
                }
            } else {
                println!("Not logged in");
            }
        }
        ("notifications", Some(m)) => {
            require_login(&mut session).await?;
            let notifications = client.list_notifications().await?;
            println!("{} unread", unread_count(&notifications));
            for n in &notifications {
                let mark = if n.is_read { ' ' } else { '*' };
                println!(
                    "{} {}  {:?}  {}: {}",
                    mark,
                    n.created_at.format("%Y-%m-%d %H:%M"),
                    n.kind,
                    n.title,
                    n.message
                );
            }
            if m.is_present("mark-read") {
                client.mark_all_read().await?;
            }
        }
        ("shares", Some(m)) => {
            require_login(&mut session).await?;
            let kind = share_kind(arg(m, "kind")?)?;
            for share in client.list_shares(kind).await? {
                let target = share.target().map(|id| id.to_string()).unwrap_or_default();
                let with = share
                    .shared_with_details
                    .as_ref()
                    .map(|u| u.email.to_string())
                    .unwrap_or_else(|| share.shared_with.to_string());
                let expires = share
                    .expires_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:>5}  {}  {}  {}  expires {}",
                    share.id, target, with, share.permission, expires
                );
            }
        }
        ("revoke", Some(m)) => {
            require_login(&mut session).await?;
            let kind = share_kind(arg(m, "kind")?)?;
            let id: i64 = arg(m, "id")?
                .parse()
                .map_err(|_| Error::NotFound(format!("share {}", arg(m, "id").unwrap_or(""))))?;
            client.revoke_share(kind, id).await?;
            println!("Revoked {} share {}", kind.as_str(), id);
        }
        (
            name @ ("ls" | "mkdir" | "rmdir" | "upload" | "rm" | "cat" | "edit" | "unlock"
            | "share" | "serve"),
            Some(m),
        ) => {
            require_login(&mut session).await?;
            let mut store = FileStore::new(client, session.user_id());
            store.load().await?;
            documents(name, m, store, &config).await?;
        }
        (name, _) => return Err(unknown_command(name)),
    }
    Ok(())
}

async fn documents(
    name: &str,
    m: &ArgMatches<'_>,
    mut store: FileStore,
    config: &Config,
) -> Result<()> {
    match name {
        "ls" => list(&store, m)?,
        "mkdir" => {
            let mut folder = NewFolder::named(arg(m, "name")?);
            if let Some(color) = m.value_of("color") {
                folder.color = color.to_string();
            }
            folder.tags = m.value_of("tags").map(parse_tags).unwrap_or_default();
            let created = store.create_folder(&folder).await?;
            println!("Created folder {} ({})", created.name, created.id);
        }
        "rmdir" => {
            let folder = find_folder(&store, arg(m, "folder")?)?;
            store.delete_folder(folder.id).await?;
            println!("Deleted folder {}", folder.name);
        }
        "upload" => {
            let path = Path::new(arg(m, "path")?);
            let folder = match m.value_of("folder") {
                Some(key) => Some(find_folder(&store, key)?.id),
                None => None,
            };
            let upload = Upload {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                content: fs::read(path)?,
                folder,
                description: m.value_of("description").unwrap_or("").to_string(),
                tags: m.value_of("tags").map(parse_tags).unwrap_or_default(),
                author: m.value_of("author").map(str::to_string),
            };
            let file = store.upload_file(&upload).await?;
            println!("Uploaded {} ({}, {})", file.name, file.id, file.size);
        }
        "rm" => {
            let file = find_file(&store, arg(m, "file")?)?;
            store.delete_file(file.id).await?;
            println!("Deleted {}", file.name);
        }
        "cat" => {
            let file = find_file(&store, arg(m, "file")?)?;
            let url = file
                .file_url
                .as_deref()
                .ok_or_else(|| Error::NotFound(format!("content of {}", file.name)))?;
            let data = store.client().download(url).await?;
            std::io::stdout().write_all(&data)?;
        }
        "edit" => {
            let file = find_file(&store, arg(m, "file")?)?;
            let content = fs::read_to_string(arg(m, "source")?)?;
            let me = store.user().ok_or(Error::NotAuthenticated)?;
            let read_only = file.role_for(Some(me)) == Some(Role::View);
            let mut session = EditSession::open(store.client().clone(), file, me, read_only).await?;
            session.start_editing().await?;
            let saved = session.save(&content).await;
            // hand the lock back even when the save failed
            session.finish().await?;
            saved?;
            println!("Saved {}", session.file().name);
        }
        "unlock" => {
            let file = find_file(&store, arg(m, "file")?)?;
            let me = store.user().ok_or(Error::NotAuthenticated)?;
            let mut session = EditSession::new(store.client().clone(), file, me, false);
            match session.lock_state() {
                LockState::Unlocked => println!("{} is not locked", session.file().name),
                LockState::HeldByMe => {
                    session.finish().await?;
                    println!("Unlocked {}", session.file().name);
                }
                LockState::HeldByOther(user) => {
                    session.force_unlock().await?;
                    println!("Broke lock of user {} on {}", user, session.file().name);
                }
            }
        }
        "share" => {
            let kind = share_kind(arg(m, "kind")?)?;
            let target = match kind {
                ShareKind::File => find_file(&store, arg(m, "target")?)?.id,
                ShareKind::Folder => find_folder(&store, arg(m, "target")?)?.id,
            };
            let permission = arg(m, "permission")?
                .parse::<Permission>()
                .map_err(Error::Config)?;
            let expires_at = match m.value_of("expires") {
                Some(at) => Some(at.parse::<DateTime<Utc>>().map_err(|e| {
                    Error::Config(format!("invalid --expires `{}`: {}", at, e))
                })?),
                None => None,
            };
            let share = NewShare {
                kind,
                target,
                email: arg(m, "email")?.to_string(),
                permission,
                expires_at,
                message: m.value_of("message").unwrap_or("").to_string(),
            };
            store.client().share(&share).await?;
            println!("Access granted to {} as {}", share.email, share.permission);
        }
        "serve" => serve(store, config).await?,
        other => return Err(unknown_command(other)),
    }
    Ok(())
}

fn list(store: &FileStore, m: &ArgMatches<'_>) -> Result<()> {
    let mut files: Vec<&File> = match m.value_of("search") {
        Some(query) => store.search(query),
        None => store.files().iter().collect(),
    };
    if m.is_present("mine") {
        let mine: Vec<Uuid> = store.my_files().iter().map(|f| f.id).collect();
        files.retain(|f| mine.contains(&f.id));
    }
    if m.is_present("shared") {
        let shared: Vec<Uuid> = store.shared_files().iter().map(|f| f.id).collect();
        files.retain(|f| shared.contains(&f.id));
    }

    match m.value_of("folder") {
        Some(key) => {
            let folder = find_folder(store, key)?;
            files.retain(|f| f.folder == Some(folder.id));
        }
        None => {
            for folder in store.folders() {
                println!(
                    "{}  {}/  ({} files)",
                    folder.id,
                    folder.name,
                    store.folder_file_count(folder.id)
                );
            }
        }
    }

    for file in files {
        let role = file
            .role_for(store.user())
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let lock = match file.locked_by {
            Some(user) => format!("  locked by {}", user),
            None => String::new(),
        };
        println!("{}  {}  {}  {}{}", file.id, file.name, file.size, role, lock);
    }
    Ok(())
}

async fn serve(store: FileStore, config: &Config) -> Result<()> {
    let addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|e| Error::Config(format!("invalid listen address `{}`: {}", config.listen, e)))?;

    let dav_server = DavHandler::builder()
        .filesystem(DocumentFs::new(Arc::new(Mutex::new(store)), config.cache_size))
        .locksystem(FakeLs::new())
        .build_handler();

    let make_service = hyper::service::make_service_fn(move |_| {
        let dav_server = dav_server.clone();
        async move {
            let func = move |req| {
                let dav_server = dav_server.clone();
                async move { Ok::<_, Infallible>(dav_server.handle(req).await) }
            };
            Ok::<_, Infallible>(hyper::service::service_fn(func))
        }
    });

    tracing::info!("Serving on {}", addr);
    hyper::Server::bind(&addr)
        .serve(make_service)
        .await
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
}

async fn require_login(session: &mut Session) -> Result<()> {
    if session.restore().await? {
        Ok(())
    } else {
        Err(Error::NotAuthenticated)
    }
}

fn unknown_command(name: &str) -> Error {
    Error::Config(format!("unknown command `{}`, see --help", name))
}

fn arg<'a>(m: &'a ArgMatches<'_>, name: &str) -> Result<&'a str> {
    m.value_of(name)
        .ok_or_else(|| Error::Config(format!("missing argument <{}>", name)))
}

fn share_kind(kind: &str) -> Result<ShareKind> {
    kind.parse().map_err(Error::Config)
}

fn find_folder(store: &FileStore, key: &str) -> Result<Folder> {
    let by_id = key.parse::<Uuid>().ok();
    store
        .folders()
        .iter()
        .find(|f| Some(f.id) == by_id || f.name == key)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("folder {}", key)))
}

fn find_file(store: &FileStore, key: &str) -> Result<File> {
    let by_id = key.parse::<Uuid>().ok();
    store
        .files()
        .iter()
        .find(|f| Some(f.id) == by_id || f.name == key)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("file {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_command_is_required() {
        assert!(cli().get_matches_from_safe(vec!["docdesk"]).is_err());
        assert!(cli().get_matches_from_safe(vec!["docdesk", "sync"]).is_err());
    }

    #[test]
    fn share_permission_defaults_to_view() {
        let m = cli()
            .get_matches_from_safe(vec!["docdesk", "share", "file", "lease.docx", "bob@example.org"])
            .unwrap();
        let (_, sub) = m.subcommand();
        let sub = sub.unwrap();
        assert_eq!(sub.value_of("permission"), Some("VIEW"));
        assert_eq!(share_kind(sub.value_of("kind").unwrap()).unwrap(), ShareKind::File);
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(matches!(unknown_command("sync"), Error::Config(_)));
    }
}
