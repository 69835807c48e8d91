//! Authentication predicates consulted by the transport before a session
//! is created.
//!
//! Two independent checks are supported:
//! - public key match against a JSON allow-list keyed by username
//! - a challenge/response over configured questions and answers
//!
//! The core never sees unauthenticated connections; these predicates only
//! answer pass or fail.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::{AuthConfig, ChallengeQuestion};

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedUser {
    pub username: String,
    pub public_key: String,
}

/// Allow-list file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthorizedUsers {
    #[serde(default)]
    pub users: Vec<AuthorizedUser>,
}

/// A public key reduced to its algorithm name and raw wire blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: String,
    blob: Vec<u8>,
}

impl PublicKey {
    /// Parses an `authorized_keys`-style line: `<algorithm> <base64> [comment]`.
    ///
    /// Returns `None` for malformed lines, including blobs whose embedded
    /// algorithm name disagrees with the declared one.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let algorithm = parts.next()?;
        let blob = STANDARD.decode(parts.next()?).ok()?;

        let len_bytes: [u8; 4] = blob.get(..4)?.try_into().ok()?;
        let name_len = u32::from_be_bytes(len_bytes) as usize;
        let embedded = blob.get(4..4 + name_len)?;
        if embedded != algorithm.as_bytes() {
            return None;
        }

        Some(Self {
            algorithm: algorithm.to_string(),
            blob,
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }
}

impl AuthorizedUsers {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read authorized keys from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse authorized keys from {}", path.display()))
    }

    /// Returns true if `username` has at least one allow-list entry.
    pub fn contains(&self, username: &str) -> bool {
        self.users.iter().any(|user| user.username == username)
    }

    /// Returns true if `username` is listed with a key equal to `offered`.
    /// Malformed entries are skipped.
    pub fn matches(&self, username: &str, offered: &PublicKey) -> bool {
        self.users
            .iter()
            .filter(|user| user.username == username)
            .filter_map(|user| PublicKey::parse(&user.public_key))
            .any(|key| &key == offered)
    }
}

/// Configured challenge questions with hashed expected answers.
#[derive(Debug, Clone, Default)]
pub struct Challenge {
    questions: Vec<(String, [u8; 32])>,
}

fn digest(answer: &str) -> [u8; 32] {
    Sha256::digest(answer.as_bytes()).into()
}

impl Challenge {
    /// Builds the challenge, resolving each answer from the literal value or
    /// its environment variable, in question order.
    pub fn from_questions(questions: &[ChallengeQuestion]) -> Result<Self> {
        let mut resolved = Vec::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            let answer = match (&question.answer, &question.answer_env) {
                (Some(answer), _) => answer.clone(),
                (None, Some(var)) => std::env::var(var).with_context(|| {
                    format!("Challenge question {} expects answer in ${var}", index + 1)
                })?,
                (None, None) => bail!(
                    "Challenge question {} has neither `answer` nor `answer_env`",
                    index + 1
                ),
            };
            resolved.push((question.prompt.clone(), digest(&answer)));
        }
        Ok(Self {
            questions: resolved,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn prompts(&self) -> impl Iterator<Item = &str> {
        self.questions.iter().map(|(prompt, _)| prompt.as_str())
    }

    /// Checks one answer per question, matched by position.
    pub fn verify(&self, answers: &[String]) -> bool {
        !self.questions.is_empty()
            && answers.len() == self.questions.len()
            && self
                .questions
                .iter()
                .zip(answers)
                .all(|((_, expected), answer)| digest(answer) == *expected)
    }
}

/// Combined authentication policy.
#[derive(Debug, Clone, Default)]
pub struct Authenticator {
    users: AuthorizedUsers,
    challenge: Challenge,
    allow_unauthenticated: bool,
}

impl Authenticator {
    pub fn new(users: AuthorizedUsers, challenge: Challenge, allow_unauthenticated: bool) -> Self {
        Self {
            users,
            challenge,
            allow_unauthenticated,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let users = match &config.authorized_keys {
            Some(path) => AuthorizedUsers::load(path)?,
            None => AuthorizedUsers::default(),
        };
        let challenge = Challenge::from_questions(&config.challenge)?;
        if challenge.is_empty() && !config.allow_unauthenticated {
            tracing::warn!("No challenge questions configured; all logins will be rejected");
        }
        Ok(Self::new(users, challenge, config.allow_unauthenticated))
    }

    /// True when logins are accepted without any check.
    pub fn is_open(&self) -> bool {
        self.allow_unauthenticated
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    /// True when `username` may log in with a public key.
    pub fn has_key_for(&self, username: &str) -> bool {
        self.users.contains(username)
    }

    pub fn check_public_key(&self, username: &str, key_line: &str) -> bool {
        tracing::info!(user = username, "Attempting public-key authentication");
        let ok = PublicKey::parse(key_line).is_some_and(|key| self.users.matches(username, &key));
        if ok {
            tracing::info!(user = username, "Public-key authentication successful");
        } else {
            tracing::warn!(user = username, "Public-key authentication failed");
        }
        ok
    }

    pub fn check_challenge(&self, username: &str, answers: &[String]) -> bool {
        tracing::info!(user = username, "Attempting challenge authentication");
        let ok = self.challenge.verify(answers);
        if ok {
            tracing::info!(user = username, "Challenge authentication successful");
        } else {
            tracing::warn!(user = username, "Challenge authentication failed");
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn encode_key(algorithm: &str, material: &[u8]) -> String {
        let mut blob = Vec::new();
        blob.extend_from_slice(&(algorithm.len() as u32).to_be_bytes());
        blob.extend_from_slice(algorithm.as_bytes());
        blob.extend_from_slice(&(material.len() as u32).to_be_bytes());
        blob.extend_from_slice(material);
        format!("{algorithm} {} user@host", STANDARD.encode(blob))
    }

    fn users(entries: &[(&str, String)]) -> AuthorizedUsers {
        AuthorizedUsers {
            users: entries
                .iter()
                .map(|(username, key)| AuthorizedUser {
                    username: (*username).to_string(),
                    public_key: key.clone(),
                })
                .collect(),
        }
    }

    fn question(prompt: &str, answer: &str) -> ChallengeQuestion {
        ChallengeQuestion {
            prompt: prompt.to_string(),
            answer: Some(answer.to_string()),
            answer_env: None,
        }
    }

    #[test]
    fn test_parse_public_key() {
        let line = encode_key("ssh-ed25519", &[7; 32]);
        let key = PublicKey::parse(&line).unwrap();
        assert_eq!(key.algorithm(), "ssh-ed25519");
    }

    #[test]
    fn test_parse_rejects_mismatched_algorithm() {
        let line = encode_key("ssh-ed25519", &[7; 32]).replacen("ssh-ed25519", "ssh-rsa", 1);
        assert!(PublicKey::parse(&line).is_none());
        assert!(PublicKey::parse("ssh-ed25519 not-base64!!").is_none());
        assert!(PublicKey::parse("").is_none());
    }

    #[test]
    fn test_public_key_match_is_keyed_by_username() {
        let alice_key = encode_key("ssh-ed25519", &[1; 32]);
        let bob_key = encode_key("ssh-ed25519", &[2; 32]);
        let auth = Authenticator::new(
            users(&[("alice", alice_key.clone()), ("bob", bob_key.clone())]),
            Challenge::default(),
            false,
        );

        assert!(auth.check_public_key("alice", &alice_key));
        assert!(!auth.check_public_key("alice", &bob_key));
        assert!(!auth.check_public_key("mallory", &alice_key));
        assert!(auth.has_key_for("bob"));
        assert!(!auth.has_key_for("mallory"));
    }

    #[test]
    fn test_malformed_allow_list_entries_are_skipped() {
        let good = encode_key("ssh-ed25519", &[3; 32]);
        let auth = Authenticator::new(
            users(&[("carol", "garbage".to_string()), ("carol", good.clone())]),
            Challenge::default(),
            false,
        );
        assert!(auth.check_public_key("carol", &good));
    }

    #[test]
    fn test_load_authorized_users_json() {
        let key = encode_key("ssh-ed25519", &[4; 32]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"users":[{{"username":"dave","publicKey":"{key}"}}]}}"#
        )
        .unwrap();

        let loaded = AuthorizedUsers::load(file.path()).unwrap();
        assert_eq!(loaded.users.len(), 1);
        assert_eq!(loaded.users[0].username, "dave");
    }

    #[test]
    fn test_challenge_answers_match_by_position() {
        let challenge = Challenge::from_questions(&[
            question("Which editor is best? ", "vim"),
            question("Who wrote this? ", "ada"),
        ])
        .unwrap();

        assert_eq!(
            challenge.prompts().collect::<Vec<_>>(),
            ["Which editor is best? ", "Who wrote this? "]
        );
        assert!(challenge.verify(&["vim".to_string(), "ada".to_string()]));
        assert!(!challenge.verify(&["ada".to_string(), "vim".to_string()]));
        assert!(!challenge.verify(&["vim".to_string()]));
    }

    #[test]
    fn test_empty_challenge_never_passes() {
        let challenge = Challenge::default();
        assert!(!challenge.verify(&[]));
    }

    #[test]
    fn test_challenge_requires_an_answer_source() {
        let err = Challenge::from_questions(&[ChallengeQuestion {
            prompt: "?".to_string(),
            answer: None,
            answer_env: None,
        }])
        .unwrap_err();
        assert!(err.to_string().contains("neither"));
    }

    #[test]
    fn test_challenge_reports_missing_env_var() {
        let err = Challenge::from_questions(&[ChallengeQuestion {
            prompt: "?".to_string(),
            answer: None,
            answer_env: Some("NEWSCHAT_TEST_ANSWER_THAT_IS_NEVER_SET".to_string()),
        }])
        .unwrap_err();
        assert!(err.to_string().contains("NEWSCHAT_TEST_ANSWER_THAT_IS_NEVER_SET"));
    }
}
