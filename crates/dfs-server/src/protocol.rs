//! The `////`-delimited text protocol.
//!
//! A request is a verb followed by its arguments, all joined by `////`:
//!
//! ```text
//! ls                      list the working directory
//! ls////docs              list docs
//! cd////docs
//! up
//! read////a.txt
//! write////a.txt////hello world
//! delete////a.txt
//! lock////a.txt
//! release////a.txt
//! mkdir////new
//! rmdir////new
//! pwd
//! exit
//! KILL_SERVICE            (whole message only)
//! ```
//!
//! Everything after the path of a `write` is file contents, delimiters
//! included. Each request gets exactly one plain-text response.

use std::str::FromStr;

use dfs_kernel::{
    ChangeDirOutcome, DeleteOutcome, FileSystemManager, FsResult, ListOutcome, LockOutcome,
    MkdirOutcome, MoveUpOutcome, ReadOutcome, ReleaseOutcome, RmdirOutcome, SessionId,
    WriteOutcome,
};
use strum::{Display, EnumString};
use thiserror::Error;

pub use dfs_wire::DELIMITER;

/// Whole-message command that stops the server.
pub const KILL_SERVICE: &str = "KILL_SERVICE";

pub const UNRECOGNISED_COMMAND: &str = "unrecognised command";
pub const SERVER_ERROR: &str = "server error";
pub const LIST_HEADER: &str = "Type\tPath";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Verb {
    Ls,
    Cd,
    Up,
    Read,
    Write,
    Delete,
    Lock,
    Release,
    Mkdir,
    Rmdir,
    Pwd,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),

    #[error("{verb} takes {expected} argument(s), got {got}")]
    BadArity {
        verb: Verb,
        expected: &'static str,
        got: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// An empty path lists the working directory.
    List { path: String },
    ChangeDir { path: String },
    Up,
    Read { path: String },
    Write { path: String, contents: String },
    Delete { path: String },
    Lock { path: String },
    Release { path: String },
    MakeDir { name: String },
    RemoveDir { name: String },
    Pwd,
    Exit,
    KillService,
}

impl Request {
    pub fn parse(message: &str) -> Result<Self, ProtocolError> {
        if message == KILL_SERVICE {
            return Ok(Request::KillService);
        }

        let (head, rest) = match message.split_once(DELIMITER) {
            Some((head, rest)) => (head, Some(rest)),
            None => (message, None),
        };
        let verb = Verb::from_str(head).map_err(|_| ProtocolError::UnknownVerb(head.to_string()))?;

        let args: Vec<&str> = rest.map(|r| r.split(DELIMITER).collect()).unwrap_or_default();
        let one = |args: &[&str]| match args {
            [arg] => Ok(arg.to_string()),
            _ => Err(ProtocolError::BadArity {
                verb,
                expected: "1",
                got: args.len(),
            }),
        };
        let none = |args: &[&str]| {
            if args.is_empty() {
                Ok(())
            } else {
                Err(ProtocolError::BadArity {
                    verb,
                    expected: "0",
                    got: args.len(),
                })
            }
        };

        Ok(match verb {
            Verb::Ls => match args.as_slice() {
                [] => Request::List { path: String::new() },
                [path] => Request::List { path: path.to_string() },
                _ => {
                    return Err(ProtocolError::BadArity {
                        verb,
                        expected: "0 or 1",
                        got: args.len(),
                    });
                }
            },
            Verb::Cd => Request::ChangeDir { path: one(&args)? },
            Verb::Read => Request::Read { path: one(&args)? },
            Verb::Delete => Request::Delete { path: one(&args)? },
            Verb::Lock => Request::Lock { path: one(&args)? },
            Verb::Release => Request::Release { path: one(&args)? },
            Verb::Mkdir => Request::MakeDir { name: one(&args)? },
            Verb::Rmdir => Request::RemoveDir { name: one(&args)? },
            Verb::Up => none(&args).map(|_| Request::Up)?,
            Verb::Pwd => none(&args).map(|_| Request::Pwd)?,
            Verb::Exit => none(&args).map(|_| Request::Exit)?,
            // write keeps everything after its path verbatim
            Verb::Write => {
                let Some(rest) = rest else {
                    return Err(ProtocolError::BadArity {
                        verb,
                        expected: "1 or 2",
                        got: 0,
                    });
                };
                let (path, contents) = rest.split_once(DELIMITER).unwrap_or((rest, ""));
                Request::Write {
                    path: path.to_string(),
                    contents: contents.to_string(),
                }
            }
        })
    }

    /// Render back into wire form.
    pub fn to_wire(&self) -> String {
        match self {
            Request::List { path } if path.is_empty() => Verb::Ls.to_string(),
            Request::List { path } => join(Verb::Ls, &[path]),
            Request::ChangeDir { path } => join(Verb::Cd, &[path]),
            Request::Up => Verb::Up.to_string(),
            Request::Read { path } => join(Verb::Read, &[path]),
            Request::Write { path, contents } => join(Verb::Write, &[path, contents]),
            Request::Delete { path } => join(Verb::Delete, &[path]),
            Request::Lock { path } => join(Verb::Lock, &[path]),
            Request::Release { path } => join(Verb::Release, &[path]),
            Request::MakeDir { name } => join(Verb::Mkdir, &[name]),
            Request::RemoveDir { name } => join(Verb::Rmdir, &[name]),
            Request::Pwd => Verb::Pwd.to_string(),
            Request::Exit => Verb::Exit.to_string(),
            Request::KillService => KILL_SERVICE.to_string(),
        }
    }
}

fn join(verb: Verb, args: &[&String]) -> String {
    let mut wire = verb.to_string();
    for arg in args {
        wire.push_str(DELIMITER);
        wire.push_str(arg);
    }
    wire
}

/// What the connection loop does after sending a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    /// Close this connection.
    Disconnect,
    /// Stop the whole server.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub action: Action,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: Action::Continue,
        }
    }

    fn with_action(text: impl Into<String>, action: Action) -> Self {
        Self {
            text: text.into(),
            action,
        }
    }
}

/// Run one request against the manager and render the response text.
pub async fn respond(manager: &FileSystemManager, id: SessionId, request: Request) -> FsResult<Reply> {
    let text = match request {
        Request::List { path } => match manager.list(id, &path).await? {
            ListOutcome::Listing(entries) => {
                let mut table = String::from(LIST_HEADER);
                for entry in entries {
                    table.push('\n');
                    table.push(entry.tag());
                    table.push('\t');
                    table.push_str(&entry.name);
                }
                table
            }
            ListOutcome::NotFound => format!("No such directory {path}"),
            ListOutcome::NotAListing => format!("Cannot list contents of {path}"),
        },

        Request::ChangeDir { path } => match manager.change_directory(id, &path).await? {
            ChangeDirOutcome::Changed => format!("changed directory to {path}"),
            ChangeDirOutcome::NoSuchDirectory => format!("directory {path} doesn't exist"),
        },

        Request::Up => match manager.move_up(id)? {
            MoveUpOutcome::Changed => format!("moved up to {}", manager.working_directory(id)?),
            MoveUpOutcome::AtRoot => "already at root directory".to_string(),
        },

        Request::Read { path } => match manager.read(id, &path).await? {
            ReadOutcome::Content { path, contents } => format!("{path}{DELIMITER}{contents}"),
            ReadOutcome::NotFound => format!("{path} doesn't exist"),
            ReadOutcome::IsADirectory => format!("{path} is a directory"),
        },

        Request::Write { path, contents } => match manager.write(id, &path, &contents).await? {
            WriteOutcome::Written => "write process is successful".to_string(),
            WriteOutcome::Locked => "file locked".to_string(),
            WriteOutcome::IsADirectory => "cannot write to a directory file".to_string(),
        },

        Request::Delete { path } => match manager.delete(id, &path).await? {
            DeleteOutcome::Deleted => format!("deleted {path}"),
            DeleteOutcome::Locked => "file locked".to_string(),
            DeleteOutcome::IsADirectory => "cannot delete a directory, use rmdir".to_string(),
            DeleteOutcome::NotFound => format!("{path} doesn't exist"),
        },

        Request::Lock { path } => match manager.lock(id, &path).await? {
            LockOutcome::Locked => format!("locked {path}"),
            LockOutcome::AlreadyLocked => format!("{path} is already locked"),
            LockOutcome::NotFound => format!("{path} doesn't exist"),
            LockOutcome::IsADirectory => "cannot lock a directory".to_string(),
        },

        Request::Release { path } => match manager.release_lock(id, &path)? {
            ReleaseOutcome::Released => format!("released {path}"),
            ReleaseOutcome::NotHeld => format!("{path} is not locked by this client"),
        },

        Request::MakeDir { name } => match manager.make_directory(id, &name).await? {
            MkdirOutcome::Created => format!("created directory {name}"),
            MkdirOutcome::FileExists => format!("a file named {name} already exists"),
            MkdirOutcome::DirExists => format!("directory {name} already exists"),
        },

        Request::RemoveDir { name } => match manager.remove_directory(id, &name).await? {
            RmdirOutcome::Removed => format!("removed directory {name}"),
            RmdirOutcome::NotFound => format!("directory {name} doesn't exist"),
            RmdirOutcome::IsAFile => format!("{name} is a file"),
            RmdirOutcome::HasLockedContents => format!("directory {name} has locked contents"),
        },

        Request::Pwd => manager.working_directory(id)?,

        Request::Exit => {
            manager.disconnect(id);
            return Ok(Reply::with_action("disconnected", Action::Disconnect));
        }

        Request::KillService => {
            return Ok(Reply::with_action("Killing Service", Action::Shutdown));
        }
    };

    Ok(Reply::text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_kernel::ManagerConfig;
    use tempfile::TempDir;

    fn parse(message: &str) -> Request {
        Request::parse(message).unwrap()
    }

    #[test]
    fn test_parse_verbs() {
        assert_eq!(parse("ls"), Request::List { path: String::new() });
        assert_eq!(parse("ls////docs"), Request::List { path: "docs".into() });
        assert_eq!(parse("cd////docs"), Request::ChangeDir { path: "docs".into() });
        assert_eq!(parse("up"), Request::Up);
        assert_eq!(parse("pwd"), Request::Pwd);
        assert_eq!(parse("exit"), Request::Exit);
        assert_eq!(parse("mkdir////x"), Request::MakeDir { name: "x".into() });
        assert_eq!(parse("rmdir////x"), Request::RemoveDir { name: "x".into() });
        assert_eq!(parse("KILL_SERVICE"), Request::KillService);
    }

    #[test]
    fn test_parse_write_contents() {
        assert_eq!(
            parse("write////a.txt"),
            Request::Write { path: "a.txt".into(), contents: String::new() }
        );
        assert_eq!(
            parse("write////a.txt////x////y"),
            Request::Write { path: "a.txt".into(), contents: "x////y".into() }
        );
        assert_eq!(
            parse("write////a.txt////line\nline"),
            Request::Write { path: "a.txt".into(), contents: "line\nline".into() }
        );
    }

    #[test]
    fn test_parse_unknown_verb() {
        for message in ["", "LS", "list////x", "KILL_SERVICE////now", "kill_service"] {
            assert!(
                matches!(Request::parse(message), Err(ProtocolError::UnknownVerb(_))),
                "{message:?} should be unknown"
            );
        }
    }

    #[test]
    fn test_parse_bad_arity() {
        for message in ["cd", "cd////a////b", "up////x", "pwd////", "ls////a////b", "write", "read"] {
            assert!(
                matches!(Request::parse(message), Err(ProtocolError::BadArity { .. })),
                "{message:?} should have bad arity"
            );
        }
    }

    #[test]
    fn test_wire_form() {
        let request = Request::Write { path: "a".into(), contents: "b////c".into() };
        assert_eq!(request.to_wire(), "write////a////b////c");
        assert_eq!(Request::parse(&request.to_wire()).unwrap(), request);
        assert_eq!(Request::List { path: String::new() }.to_wire(), "ls");
        assert_eq!(Request::KillService.to_wire(), "KILL_SERVICE");
    }

    fn setup() -> (FileSystemManager, SessionId, TempDir) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("FileSystemDir")).unwrap();
        let manager = FileSystemManager::new(ManagerConfig::new(dir.path(), "FileSystemDir"));
        let (id, _) = manager.connect(None);
        (manager, id, dir)
    }

    async fn say(manager: &FileSystemManager, id: SessionId, message: &str) -> String {
        respond(manager, id, parse(message)).await.unwrap().text
    }

    #[tokio::test]
    async fn test_session_walkthrough() {
        let (manager, id, _dir) = setup();

        assert_eq!(say(&manager, id, "mkdir////docs").await, "created directory docs");
        assert_eq!(say(&manager, id, "mkdir////docs").await, "directory docs already exists");
        assert_eq!(say(&manager, id, "cd////docs").await, "changed directory to docs");
        assert_eq!(say(&manager, id, "pwd").await, "FileSystemDir/docs/");
        assert_eq!(say(&manager, id, "write////a.txt////hello").await, "write process is successful");
        assert_eq!(say(&manager, id, "read////a.txt").await, "FileSystemDir/docs/a.txt////hello");
        assert_eq!(say(&manager, id, "ls").await, "Type\tPath\nf\ta.txt");
        assert_eq!(say(&manager, id, "lock////a.txt").await, "locked a.txt");
        assert_eq!(say(&manager, id, "lock////a.txt").await, "a.txt is already locked");
        assert_eq!(say(&manager, id, "release////a.txt").await, "released a.txt");
        assert_eq!(say(&manager, id, "release////a.txt").await, "a.txt is not locked by this client");
        assert_eq!(say(&manager, id, "delete////a.txt").await, "deleted a.txt");
        assert_eq!(say(&manager, id, "up").await, "moved up to FileSystemDir/");
        assert_eq!(say(&manager, id, "up").await, "already at root directory");
        assert_eq!(say(&manager, id, "rmdir////docs").await, "removed directory docs");
    }

    #[tokio::test]
    async fn test_error_texts() {
        let (manager, id, dir) = setup();
        std::fs::create_dir(dir.path().join("FileSystemDir/d")).unwrap();
        std::fs::write(dir.path().join("FileSystemDir/f"), "x").unwrap();

        assert_eq!(say(&manager, id, "ls////nope").await, "No such directory nope");
        assert_eq!(say(&manager, id, "ls////f").await, "Cannot list contents of f");
        assert_eq!(say(&manager, id, "cd////nope").await, "directory nope doesn't exist");
        assert_eq!(say(&manager, id, "read////nope").await, "nope doesn't exist");
        assert_eq!(say(&manager, id, "read////d").await, "d is a directory");
        assert_eq!(say(&manager, id, "write////d////x").await, "cannot write to a directory file");
        assert_eq!(say(&manager, id, "delete////d").await, "cannot delete a directory, use rmdir");
        assert_eq!(say(&manager, id, "delete////nope").await, "nope doesn't exist");
        assert_eq!(say(&manager, id, "lock////d").await, "cannot lock a directory");
        assert_eq!(say(&manager, id, "lock////nope").await, "nope doesn't exist");
        assert_eq!(say(&manager, id, "mkdir////f").await, "a file named f already exists");
        assert_eq!(say(&manager, id, "rmdir////f").await, "f is a file");
        assert_eq!(say(&manager, id, "rmdir////nope").await, "directory nope doesn't exist");
    }

    #[tokio::test]
    async fn test_locked_by_other_session() {
        let (manager, a, dir) = setup();
        std::fs::create_dir(dir.path().join("FileSystemDir/d")).unwrap();
        std::fs::write(dir.path().join("FileSystemDir/d/f"), "x").unwrap();
        let (b, _) = manager.connect(None);

        assert_eq!(say(&manager, a, "lock////d/f").await, "locked d/f");
        assert_eq!(say(&manager, b, "write////d/f////y").await, "file locked");
        assert_eq!(say(&manager, b, "delete////d/f").await, "file locked");
        assert_eq!(say(&manager, b, "rmdir////d").await, "directory d has locked contents");
        assert_eq!(say(&manager, b, "release////d/f").await, "d/f is not locked by this client");
    }

    #[tokio::test]
    async fn test_exit_disconnects() {
        let (manager, id, _dir) = setup();
        let reply = respond(&manager, id, Request::Exit).await.unwrap();
        assert_eq!(reply, Reply { text: "disconnected".into(), action: Action::Disconnect });
        assert!(!manager.session_exists(id));
    }

    #[tokio::test]
    async fn test_kill_service() {
        let (manager, id, _dir) = setup();
        let reply = respond(&manager, id, Request::KillService).await.unwrap();
        assert_eq!(reply.text, "Killing Service");
        assert_eq!(reply.action, Action::Shutdown);
    }

    #[tokio::test]
    async fn test_escape_is_an_error_when_confined() {
        let dir = TempDir::new().unwrap();
        let mut config = ManagerConfig::new(dir.path(), "FileSystemDir");
        config.confine_to_root = true;
        let manager = FileSystemManager::new(config);
        let (id, _) = manager.connect(None);

        let err = respond(&manager, id, parse("read////../x")).await.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "path escapes root: ../x");
    }
}
