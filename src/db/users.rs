use super::{now_ms, Db, DbError};
use crate::event::Attachment;
use rusqlite::OptionalExtension;

/// The single slot the conversation is waiting on for a given user.
/// Never more than one step ahead of the collected fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prompt {
    #[default]
    None,
    GetVoteId,
    GetUserName,
    GetPhoneNumber,
    GetEmail,
}

impl Prompt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prompt::None => "",
            Prompt::GetVoteId => "GET_VOTE_ID",
            Prompt::GetUserName => "GET_USER_NAME",
            Prompt::GetPhoneNumber => "GET_PHONE_NUMBER",
            Prompt::GetEmail => "GET_EMAIL",
        }
    }

    pub fn from_str(s: &str) -> Prompt {
        match s {
            "GET_VOTE_ID" => Prompt::GetVoteId,
            "GET_USER_NAME" => Prompt::GetUserName,
            "GET_PHONE_NUMBER" => Prompt::GetPhoneNumber,
            "GET_EMAIL" => Prompt::GetEmail,
            _ => Prompt::None,
        }
    }
}

/// Per-sender document: platform profile, campaign slots, and the state
/// the conversation machine runs on. Soft-disabled via `turned_on`, never
/// deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct UserDocument {
    pub sender: String,
    pub first_name: String,
    pub last_name: String,
    pub turned_on: bool,
    pub last_prompt: Prompt,
    pub user_name: String,
    pub phone: String,
    pub email: String,
    pub vote_id: String,
    pub opened_gift: bool,
    pub flag_vote: bool,
    pub pending_attachment: Option<Attachment>,
}

impl UserDocument {
    /// Defaults for a first-ever sender, seeded from the platform profile.
    pub fn new(sender: impl Into<String>, first_name: &str, last_name: &str) -> Self {
        Self {
            sender: sender.into(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            turned_on: true,
            last_prompt: Prompt::None,
            user_name: String::new(),
            phone: String::new(),
            email: String::new(),
            vote_id: String::new(),
            opened_gift: false,
            flag_vote: false,
            pending_attachment: None,
        }
    }

    /// All three slot-filling fields collected.
    pub fn profile_complete(&self) -> bool {
        !self.user_name.is_empty() && !self.phone.is_empty() && !self.email.is_empty()
    }

    /// Display name from the platform profile, family name first.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

impl Db {
    /// Find a user document by sender id.
    pub async fn users_find(&self, sender: &str) -> Result<Option<UserDocument>, DbError> {
        let sender = sender.to_string();
        self.exec(move |conn| {
            let doc = conn
                .prepare(
                    "SELECT sender, first_name, last_name, turned_on, last_prompt, user_name,
                            phone, email, vote_id, opened_gift, flag_vote, pending_attachment
                     FROM users WHERE sender = ?1",
                )?
                .query_row(rusqlite::params![sender], |row| {
                    Ok((
                        UserDocument {
                            sender: row.get(0)?,
                            first_name: row.get(1)?,
                            last_name: row.get(2)?,
                            turned_on: row.get(3)?,
                            last_prompt: Prompt::from_str(&row.get::<_, String>(4)?),
                            user_name: row.get(5)?,
                            phone: row.get(6)?,
                            email: row.get(7)?,
                            vote_id: row.get(8)?,
                            opened_gift: row.get(9)?,
                            flag_vote: row.get(10)?,
                            pending_attachment: None,
                        },
                        row.get::<_, Option<String>>(11)?,
                    ))
                })
                .optional()?;
            match doc {
                Some((mut doc, attachment_json)) => {
                    if let Some(json) = attachment_json {
                        doc.pending_attachment = serde_json::from_str(&json)?;
                    }
                    Ok(Some(doc))
                }
                None => Ok(None),
            }
        })
        .await
    }

    /// Insert or replace a user document, keyed by sender.
    pub async fn users_upsert(&self, doc: &UserDocument) -> Result<(), DbError> {
        let doc = doc.clone();
        let now = now_ms() as i64;
        self.exec(move |conn| {
            let attachment_json = doc
                .pending_attachment
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            conn.execute(
                "INSERT INTO users (sender, first_name, last_name, turned_on, last_prompt,
                                    user_name, phone, email, vote_id, opened_gift, flag_vote,
                                    pending_attachment, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
                 ON CONFLICT(sender) DO UPDATE SET
                     first_name = excluded.first_name,
                     last_name = excluded.last_name,
                     turned_on = excluded.turned_on,
                     last_prompt = excluded.last_prompt,
                     user_name = excluded.user_name,
                     phone = excluded.phone,
                     email = excluded.email,
                     vote_id = excluded.vote_id,
                     opened_gift = excluded.opened_gift,
                     flag_vote = excluded.flag_vote,
                     pending_attachment = excluded.pending_attachment,
                     updated_at = excluded.updated_at",
                rusqlite::params![
                    doc.sender,
                    doc.first_name,
                    doc.last_name,
                    doc.turned_on,
                    doc.last_prompt.as_str(),
                    doc.user_name,
                    doc.phone,
                    doc.email,
                    doc.vote_id,
                    doc.opened_gift,
                    doc.flag_vote,
                    attachment_json,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Number of known users.
    pub async fn users_count(&self) -> Result<u64, DbError> {
        self.exec(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}
