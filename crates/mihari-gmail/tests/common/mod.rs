//! In-process fakes for the Gmail core's external seams.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use mihari_gmail::{
    BoxFuture, EncryptedToken, GmailError, GmailErrorCode, GmailResult, MailboxApi, MessageHeader,
    MessageMetadata, MessageRef, TokenCipher, TokenEndpoint, TokenGrant, TokenResponse,
};

/// Token endpoint answering from a queue of scripted replies.
#[derive(Default)]
pub struct ScriptedEndpoint {
    replies: Mutex<Vec<Result<TokenResponse, GmailErrorCode>>>,
    pub grants: Mutex<Vec<TokenGrant>>,
}

impl ScriptedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(
        self,
        access: Option<&str>,
        refresh: Option<&str>,
        expires_in: Option<i64>,
    ) -> Self {
        self.replies.lock().unwrap().push(Ok(TokenResponse {
            access_token: access.map(str::to_string),
            refresh_token: refresh.map(str::to_string),
            expires_in,
            token_type: Some("Bearer".to_string()),
            scope: None,
        }));
        self
    }

    pub fn then_err(self, code: GmailErrorCode) -> Self {
        self.replies.lock().unwrap().push(Err(code));
        self
    }

    pub fn calls(&self) -> usize {
        self.grants.lock().unwrap().len()
    }
}

impl TokenEndpoint for ScriptedEndpoint {
    fn request_token(&self, grant: TokenGrant) -> BoxFuture<'_, GmailResult<TokenResponse>> {
        self.grants.lock().unwrap().push(grant);
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.is_empty() {
            Err(GmailError::internal("no scripted token reply left"))
        } else {
            replies
                .remove(0)
                .map_err(|code| GmailError::new(code, "scripted token failure"))
        };
        Box::pin(async move { reply })
    }
}

/// XOR-and-hex "cipher"; blobs that are not valid hex fail to decrypt.
pub struct XorCipher(pub u8);

impl TokenCipher for XorCipher {
    fn encrypt(&self, plaintext: &str) -> GmailResult<EncryptedToken> {
        let hex: String = plaintext
            .bytes()
            .map(|b| format!("{:02x}", b ^ self.0))
            .collect();
        Ok(EncryptedToken::new(hex))
    }

    fn decrypt(&self, blob: &EncryptedToken) -> GmailResult<String> {
        let hex = blob.as_str();
        if hex.len() % 2 != 0 {
            return Err(GmailError::decryption("odd blob length"));
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map(|b| b ^ self.0))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|e| GmailError::decryption("blob is not hex").with_source(e))?;
        String::from_utf8(bytes).map_err(|e| GmailError::decryption("not utf-8").with_source(e))
    }
}

/// Mailbox with a fixed listing and scripted metadata per message id.
#[derive(Default)]
pub struct FakeMailbox {
    pub listing: Vec<MessageRef>,
    pub list_error: Option<GmailErrorCode>,
    pub metadata: HashMap<String, MessageMetadata>,
    pub failures: HashMap<String, GmailErrorCode>,
    pub list_calls: Mutex<Vec<(String, String, u32)>>,
    pub fetch_calls: Mutex<Vec<(String, Vec<String>)>>,
    pub fetches: AtomicUsize,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, id: &str, snippet: &str, headers: &[(&str, &str)]) -> Self {
        self.listing.push(MessageRef::new(id, format!("thread-{id}")));
        let headers = headers
            .iter()
            .map(|(name, value)| MessageHeader::new(*name, *value))
            .collect();
        self.metadata
            .insert(id.to_string(), MessageMetadata::new(snippet, headers));
        self
    }

    pub fn fail_fetch(mut self, id: &str, code: GmailErrorCode) -> Self {
        self.failures.insert(id.to_string(), code);
        self
    }

    pub fn fail_listing(mut self, code: GmailErrorCode) -> Self {
        self.list_error = Some(code);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fetched_ids(&self) -> Vec<String> {
        self.fetch_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl MailboxApi for FakeMailbox {
    fn list_messages<'a>(
        &'a self,
        access_token: &'a str,
        query: &'a str,
        max_results: u32,
    ) -> BoxFuture<'a, GmailResult<Vec<MessageRef>>> {
        self.list_calls.lock().unwrap().push((
            access_token.to_string(),
            query.to_string(),
            max_results,
        ));
        let reply = match self.list_error {
            Some(code) => Err(GmailError::new(code, "scripted listing failure")),
            None => Ok(self.listing.clone()),
        };
        Box::pin(async move { reply })
    }

    fn get_message_metadata<'a>(
        &'a self,
        _access_token: &'a str,
        message_id: &'a str,
        headers: &'a [&'a str],
    ) -> BoxFuture<'a, GmailResult<MessageMetadata>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_calls.lock().unwrap().push((
            message_id.to_string(),
            headers.iter().map(|h| h.to_string()).collect(),
        ));
        let reply = match self.failures.get(message_id) {
            Some(code) => Err(GmailError::new(*code, "scripted fetch failure")),
            None => Ok(self.metadata.get(message_id).cloned().unwrap_or_default()),
        };
        Box::pin(async move { reply })
    }
}
