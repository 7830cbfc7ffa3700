//! Shared test helpers: a scripted executor and page fixtures.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::GraphQlExecutor;
use crate::loader::FactSheetLoader;
use crate::types::PageSize;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

enum Step {
    Reply(Result<Value>),
    Gated {
        started: oneshot::Sender<()>,
        reply: oneshot::Receiver<Result<Value>>,
    },
}

/// Test side of a gated response
pub(crate) struct Gate {
    /// Fires once the executor has received the request
    pub started: oneshot::Receiver<()>,
    /// Send the response the executor should return
    pub reply: oneshot::Sender<Result<Value>>,
}

impl Gate {
    /// Wait until the request has reached the executor
    pub async fn wait_started(&mut self) {
        (&mut self.started).await.unwrap();
    }

    /// Release the request with a response
    pub fn release(self, response: Result<Value>) {
        self.reply.send(response).ok();
    }
}

/// Executor that replays scripted responses in order
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Value>>,
    init_calls: AtomicUsize,
    init_error: Mutex<Option<Error>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an immediate successful response
    pub fn reply(&self, data: Value) {
        self.steps.lock().unwrap().push_back(Step::Reply(Ok(data)));
    }

    /// Queue an immediate failure
    pub fn fail(&self, error: Error) {
        self.steps.lock().unwrap().push_back(Step::Reply(Err(error)));
    }

    /// Queue a response that is held until the test releases it
    pub fn gate(&self) -> Gate {
        let (started_tx, started_rx) = oneshot::channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.steps.lock().unwrap().push_back(Step::Gated {
            started: started_tx,
            reply: reply_rx,
        });
        Gate {
            started: started_rx,
            reply: reply_tx,
        }
    }

    /// Make the next handshake fail
    pub fn fail_init(&self, error: Error) {
        *self.init_error.lock().unwrap() = Some(error);
    }

    /// Variables of every executed request, in order
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphQlExecutor for ScriptedExecutor {
    async fn init(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let error = self.init_error.lock().unwrap().take();
        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn execute(&self, _query: &str, variables: Value) -> Result<Value> {
        self.calls.lock().unwrap().push(variables);
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            Some(Step::Reply(response)) => response,
            Some(Step::Gated { started, reply }) => {
                started.send(()).ok();
                reply
                    .await
                    .unwrap_or_else(|_| Err(Error::Transport("gate dropped".to_string())))
            }
            None => Err(Error::Transport("no scripted response left".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// `data` object for one page of `allFactSheets`, with ids `fs-{n}` for `ids`
pub(crate) fn page_data(
    total: u64,
    ids: Range<u64>,
    has_next_page: bool,
    end_cursor: Option<&str>,
) -> Value {
    let edges: Vec<Value> = ids
        .map(|n| json!({ "node": { "id": format!("fs-{}", n) } }))
        .collect();
    json!({
        "allFactSheets": {
            "totalCount": total,
            "pageInfo": { "hasNextPage": has_next_page, "endCursor": end_cursor },
            "edges": edges
        }
    })
}

/// Queue the 250-item, 3-page fixture (100 / 100 / 50)
pub(crate) fn script_three_pages(executor: &ScriptedExecutor) {
    executor.reply(page_data(250, 0..100, true, Some("c100")));
    executor.reply(page_data(250, 100..200, true, Some("c200")));
    executor.reply(page_data(250, 200..250, false, Some("c250")));
}

pub(crate) fn test_config(page_size: PageSize) -> Config {
    let mut config = Config::default();
    config.loader.page_size = page_size;
    config.loader.tick_interval = Duration::from_millis(20);
    config
}

/// Loader on top of `executor`, handshake already done
pub(crate) async fn create_test_loader(
    executor: Arc<ScriptedExecutor>,
    page_size: PageSize,
) -> FactSheetLoader {
    let loader = FactSheetLoader::new(test_config(page_size), executor).unwrap();
    loader.initialize().await.unwrap();
    loader
}
