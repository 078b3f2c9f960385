//! Scripted affiliate client for handler tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mealmate_affiliate::{AffiliateClient, AffiliateError, Result};
use parking_lot::Mutex;
use serde_json::Value;

/// What every call on a [`StubClient`] does.
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    /// Succeed with this payload (deep link: the `url` string field).
    Payload(Value),
    /// Fail with an upstream error carrying this message.
    Fail(String),
    /// Panic inside the call.
    Panic,
}

/// Records calls and answers with a fixed [`Reply`].
#[derive(Debug)]
pub(crate) struct StubClient {
    reply: Reply,
    calls: AtomicUsize,
    limits: Mutex<Vec<u32>>,
    args: Mutex<Vec<String>>,
}

impl StubClient {
    pub(crate) fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            limits: Mutex::new(Vec::new()),
            args: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn limits(&self) -> Vec<u32> {
        self.limits.lock().clone()
    }

    pub(crate) fn args(&self) -> Vec<String> {
        self.args.lock().clone()
    }

    fn answer(&self, arg: &str, limit: Option<u32>) -> Result<Value> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        self.args.lock().push(arg.to_owned());
        if let Some(limit) = limit {
            self.limits.lock().push(limit);
        }
        match &self.reply {
            Reply::Payload(v) => Ok(v.clone()),
            Reply::Fail(message) => Err(AffiliateError::Api {
                code: "1".into(),
                message: message.clone(),
            }),
            Reply::Panic => panic!("stub exploded"),
        }
    }
}

#[async_trait]
impl AffiliateClient for StubClient {
    async fn best_category_products(&self, category_id: &str, limit: u32) -> Result<Value> {
        self.answer(category_id, Some(limit))
    }

    async fn search_products(&self, keyword: &str, limit: u32) -> Result<Value> {
        self.answer(keyword, Some(limit))
    }

    async fn deeplink(&self, product_url: &str) -> Result<String> {
        let payload = self.answer(product_url, None)?;
        Ok(payload["url"].as_str().unwrap_or_default().to_owned())
    }
}
