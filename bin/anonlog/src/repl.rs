//! Prompt commands and their rendering.

use std::sync::Arc;

use al_auth_simple::SimpleAuthProvider;
use al_core::{Message, VoteDirection};
use al_feed::{FeedQuery, FeedService, SendRequest, SortOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(SortOrder),
    Search(String),
    Tag(String),
    Tags,
    Post { content: String, title: Option<String>, tags: Vec<String> },
    Reply { parent_id: String, content: String },
    Vote { id: String, direction: VoteDirection },
    Delete(String),
    Ban(String),
    Unban(String),
    Dialogs,
    Register { email: String, password: String, name: Option<String> },
    Login { email: String, password: String },
    Logout,
    Verify(String),
    WhoAmI,
    Help,
    Quit,
}

const HELP: &str = "\
list [newest|oldest|best]     show the feed
search <text>                 match content, number or tag
tag <tag>                     messages carrying a tag
tags                          popular tags
post <text> [| title] [| tags]  send a message
reply <id> <text>             reply to a message
up <id> / down <id>           toggle a vote
delete <id>                   delete a message
ban <sender> / unban <sender> moderate a sender (admins)
dialogs                       your threads; clears the unread mark
register <email> <password> [name]
login <email> <password> / logout
verify <email>                confirm an account's email
whoami / help / quit";

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

fn required(arg: &str, usage: &str) -> Result<String, String> {
    if arg.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(arg.to_string())
    }
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let (word, rest) = split_word(line);
    let command = match word.to_lowercase().as_str() {
        "" => return Ok(None),
        "list" | "ls" => Command::List(match rest {
            "" | "newest" => SortOrder::Newest,
            "oldest" => SortOrder::Oldest,
            "best" => SortOrder::Best,
            other => return Err(format!("unknown sort order {other:?}")),
        }),
        "search" => Command::Search(required(rest, "search <text>")?),
        "tag" => Command::Tag(required(rest, "tag <tag>")?),
        "tags" => Command::Tags,
        "post" => {
            let mut parts = rest.splitn(3, '|').map(str::trim);
            let content = required(parts.next().unwrap_or_default(), "post <text> [| title] [| tags]")?;
            let title = parts.next().filter(|t| !t.is_empty()).map(str::to_string);
            let tags = parts.next().filter(|t| !t.is_empty()).map(|t| vec![t.to_string()]).unwrap_or_default();
            Command::Post { content, title, tags }
        }
        "reply" => {
            let (parent_id, content) = split_word(rest);
            Command::Reply {
                parent_id: required(parent_id, "reply <id> <text>")?,
                content: required(content, "reply <id> <text>")?,
            }
        }
        "up" => Command::Vote { id: required(rest, "up <id>")?, direction: VoteDirection::Up },
        "down" => Command::Vote { id: required(rest, "down <id>")?, direction: VoteDirection::Down },
        "delete" | "rm" => Command::Delete(required(rest, "delete <id>")?),
        "ban" => Command::Ban(required(rest, "ban <sender>")?),
        "unban" => Command::Unban(required(rest, "unban <sender>")?),
        "dialogs" => Command::Dialogs,
        "register" => {
            let (email, rest) = split_word(rest);
            let (password, name) = split_word(rest);
            Command::Register {
                email: required(email, "register <email> <password> [name]")?,
                password: required(password, "register <email> <password> [name]")?,
                name: (!name.is_empty()).then(|| name.to_string()),
            }
        }
        "login" => {
            let (email, password) = split_word(rest);
            Command::Login {
                email: required(email, "login <email> <password>")?,
                password: required(password, "login <email> <password>")?,
            }
        }
        "logout" => Command::Logout,
        "verify" => Command::Verify(required(rest, "verify <email>")?),
        "whoami" => Command::WhoAmI,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command {other:?}; try help")),
    };
    Ok(Some(command))
}

pub fn render(message: &Message, parent: Option<&str>) -> String {
    let mut out = format!("{} [{}]", message.display_label(), message.id);
    if let Some(title) = &message.title {
        out.push_str(&format!(" {title}"));
    }
    let author = message.sender_name.as_deref().unwrap_or(&message.sender_id);
    out.push_str(&format!(" <{author}>"));
    if message.is_admin == Some(true) {
        out.push_str(" (admin)");
    }
    out.push_str(&format!(" score {}", message.score()));
    if let Some(parent) = parent {
        out.push_str(&format!("\n    > {parent}"));
    }
    out.push_str(&format!("\n    {}", message.content));
    if !message.tags.is_empty() {
        out.push_str(&format!("\n    {}", message.tags.join(" ")));
    }
    out
}

pub struct Shell<'a> {
    service: &'a FeedService,
    auth: &'a Arc<SimpleAuthProvider>,
}

impl<'a> Shell<'a> {
    pub fn new(service: &'a FeedService, auth: &'a Arc<SimpleAuthProvider>) -> Self {
        Self { service, auth }
    }

    /// Runs one line. Returns `false` when the session should end.
    pub async fn handle(&mut self, line: &str) -> bool {
        match parse(line) {
            Ok(Some(Command::Quit)) => false,
            Ok(Some(command)) => {
                if let Err(err) = self.run(command).await {
                    println!("error: {err}");
                }
                true
            }
            Ok(None) => true,
            Err(usage) => {
                println!("{usage}");
                true
            }
        }
    }

    fn print(&self, messages: &[Message]) {
        if messages.is_empty() {
            println!("(nothing here)");
        }
        for message in messages {
            let parent = self.service.resolve_parent(message).map(|p| format!("#{:03} {}", p.sequence_number, p.content));
            println!("{}", render(message, parent.as_deref()));
        }
    }

    async fn run(&mut self, command: Command) -> anyhow::Result<()> {
        let service = self.service;
        match command {
            Command::List(sort) => self.print(&service.list(&FeedQuery { sort, ..Default::default() })),
            Command::Search(text) => self.print(&service.list(&FeedQuery { search: Some(text), ..Default::default() })),
            Command::Tag(tag) => self.print(&service.list(&FeedQuery { tag: Some(tag), ..Default::default() })),
            Command::Tags => {
                for t in service.popular_tags() {
                    println!("{} {}", t.tag, t.count);
                }
            }
            Command::Post { content, title, tags } => {
                let mut request = SendRequest::new(content).tags(tags);
                request.title = title;
                let id = service.send(request).await?;
                println!("sent {id}");
            }
            Command::Reply { parent_id, content } => {
                let id = service.send(SendRequest::new(content).reply_to(parent_id)).await?;
                println!("sent {id}");
            }
            Command::Vote { id, direction } => service.vote(&id, direction).await?,
            Command::Delete(id) => service.delete_message(&id).await?,
            Command::Ban(sender) => service.block_sender(&sender).await?,
            Command::Unban(sender) => service.unblock_sender(&sender).await?,
            Command::Dialogs => self.print(&service.open_dialogs().await?),
            Command::Register { email, password, name } => {
                let principal = self.auth.register(&email, &password, name.as_deref())?;
                println!("registered {}", principal.uid);
            }
            Command::Login { email, password } => {
                self.auth.sign_in(&email, &password)?;
            }
            Command::Logout => self.auth.sign_out(),
            Command::Verify(email) => self.auth.mark_verified(&email)?,
            Command::WhoAmI => {
                let identity = service.refresh_identity().await;
                let name = identity.display_name().unwrap_or("anonymous");
                let role = if identity.policy.is_admin() { "admin" } else { "member" };
                println!("{} {} ({role})", identity.id, name);
                if service.has_unread_dialogs().await {
                    println!("you have unread replies");
                }
                let wait = service.cooldown_remaining();
                if wait > 0 {
                    println!("next post in {wait}s");
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_with_title_and_tags() {
        assert_eq!(
            parse("post hello #world | Greeting | news, misc").unwrap(),
            Some(Command::Post {
                content: "hello #world".into(),
                title: Some("Greeting".into()),
                tags: vec!["news, misc".into()],
            })
        );
        assert_eq!(
            parse("post just text").unwrap(),
            Some(Command::Post { content: "just text".into(), title: None, tags: vec![] })
        );
    }

    #[test]
    fn test_parse_arguments_and_errors() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("LIST best").unwrap(), Some(Command::List(SortOrder::Best)));
        assert_eq!(
            parse("reply abc  nice one").unwrap(),
            Some(Command::Reply { parent_id: "abc".into(), content: "nice one".into() })
        );
        assert_eq!(
            parse("down m1").unwrap(),
            Some(Command::Vote { id: "m1".into(), direction: VoteDirection::Down })
        );
        assert!(parse("reply abc").is_err());
        assert!(parse("list sideways").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn test_render_shows_label_author_and_parent() {
        let message = Message {
            id: "m1".into(),
            title: None,
            content: "hi".into(),
            timestamp: chrono::DateTime::from_timestamp_millis(0).unwrap(),
            sequence_number: 7,
            sender_id: "anon".into(),
            sender_name: None,
            sender_avatar: None,
            parent_id: Some("p".into()),
            tags: vec!["#a".into()],
            is_admin: None,
            votes: Default::default(),
            community: None,
            media: None,
            comment_count: None,
            share_count: None,
        };
        let out = render(&message, Some("#001 root"));
        assert!(out.starts_with("#007 [m1] <anon> score 0"));
        assert!(out.contains("> #001 root"));
        assert!(out.ends_with("#a"));
    }
}
