use std::collections::{HashMap, VecDeque};

use teloxide::types::{Message, MessageEntityKind, User, UserId};

/// Reads a text, and returns any and all numbers that look like `UserId` objects as such.
fn get_potential_userids(text: &str) -> Vec<UserId> {
    text.split_whitespace()
        .flat_map(|word| word.parse().map(UserId))
        .collect()
}

/// Looks through the message for any and all users it's directed at, whether by reply or by link
/// mentions. This does not return the sender, nor users mentioned by username like `@username`.
#[must_use]
pub fn get_linkable_mentioned_users(message: &Message) -> Vec<&User> {
    let mut output = vec![];
    if let Some(repliee) = message
        .reply_to_message()
        .filter(|replied| !is_topic_root(message, replied))
        .and_then(|m| m.from.as_ref())
    {
        output.push(repliee);
    }

    if let Some(ents) = message
        .parse_entities()
        .or_else(|| message.parse_caption_entities())
    {
        for ent in ents {
            if let MessageEntityKind::TextMention { user } = ent.kind() {
                output.push(user);
            }
        }
    }
    output
}

/// Messages in forum topics "reply" to the topic's first message even when the
/// user didn't reply to anything. Returns `true` if `replied` is that.
fn is_topic_root(message: &Message, replied: &Message) -> bool {
    message.is_topic_message && message.thread_id.is_some_and(|thread| thread.0 == replied.id)
}

/// Looks through the message and returns all mentions of users by usernames it has, like
/// `@username`. This does not return link mentions (when a user has no username), nor
/// who the message is by or who it is a reply to.
fn get_text_mentioned_users(message: &Message) -> Vec<&str> {
    let mut output = vec![];
    if let Some(ents) = message
        .parse_entities()
        .or_else(|| message.parse_caption_entities())
    {
        for ent in ents {
            if let MessageEntityKind::Mention = ent.kind() {
                output.push(ent.text());
            }
        }
    }
    output
}

/// An object that is either a user or an ID of one.
/// Represents best possible result of resolving mentioned
/// users purely from a message and the usernames seen so far.
#[derive(Clone, Debug, PartialEq)]
pub enum UserLike {
    User(User),
    Id(UserId),
    UnresolvedUsername(String),
}

impl UserLike {
    /// ID of the user, if it's known.
    #[must_use]
    pub fn id(&self) -> Option<UserId> {
        match self {
            UserLike::User(user) => Some(user.id),
            UserLike::Id(id) => Some(*id),
            UserLike::UnresolvedUsername(_) => None,
        }
    }
}

pub trait MentionResolver {
    /// Log the user's username and ID into this resolver.
    fn see_user(&mut self, user: &User);
    /// Resolve a username to a user ID, if one is known to this resolver.
    /// The leading `@` is optional.
    fn username_to_userid(&self, name: &str) -> Option<UserId>;

    /// Get all users mentioned by this message that this resolver can resolve,
    /// as well as unresolved username mentions.
    ///
    /// `params` is the part of the message text to look for numeric user IDs in;
    /// usually the text after the command, so that the command itself is skipped.
    fn get_mentioned_users(&self, message: &Message, params: &str) -> Vec<UserLike> {
        let mut output = vec![];

        for user in get_linkable_mentioned_users(message) {
            output.push(UserLike::User(user.to_owned()));
        }
        for uid in get_potential_userids(params) {
            output.push(UserLike::Id(uid));
        }

        for username in get_text_mentioned_users(message) {
            if let Some(uid) = self.username_to_userid(username) {
                output.push(UserLike::Id(uid));
            } else {
                output.push(UserLike::UnresolvedUsername(String::from(username)));
            }
        }
        output
    }

    /// See and log all users a message has.
    fn see_users_from_message(&mut self, message: &Message) {
        // The one it's from;
        if let Some(u) = &message.from {
            self.see_user(u);
        }
        // The one it's replying to, and the ones it mentions by link mentions.
        for u in get_linkable_mentioned_users(message) {
            self.see_user(u);
        }
        // Username mentions don't give us any new user objects.
    }
}

/// How many usernames [`SeenUsers`] remembers by default.
pub const DEFAULT_SEEN_USERS_LIMIT: usize = 10_000;

/// In-memory [`MentionResolver`] remembering usernames of users the bot has seen.
///
/// Holds at most `limit` usernames; once full, the ones first seen the longest
/// time ago are forgotten.
#[derive(Debug)]
pub struct SeenUsers {
    usernames: HashMap<String, UserId>,
    /// Usernames in the order they were first seen.
    order: VecDeque<String>,
    limit: usize,
}

impl Default for SeenUsers {
    fn default() -> Self {
        Self::with_limit(DEFAULT_SEEN_USERS_LIMIT)
    }
}

impl SeenUsers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            usernames: HashMap::new(),
            order: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.usernames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.usernames.is_empty()
    }

    /// Usernames are case-insensitive on Telegram.
    fn normalize(name: &str) -> String {
        name.trim_start_matches('@').to_ascii_lowercase()
    }
}

impl MentionResolver for SeenUsers {
    fn see_user(&mut self, user: &User) {
        let Some(username) = &user.username else {
            return;
        };
        let username = Self::normalize(username);

        if let Some(id) = self.usernames.get_mut(&username) {
            *id = user.id;
            return;
        }

        while self.usernames.len() >= self.limit {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.usernames.remove(&oldest);
        }
        self.order.push_back(username.clone());
        self.usernames.insert(username, user.id);
    }

    fn username_to_userid(&self, name: &str) -> Option<UserId> {
        self.usernames.get(&Self::normalize(name)).copied()
    }
}
