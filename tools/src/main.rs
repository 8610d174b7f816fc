//! attribution-runner: headless driver for the checkout attribution engine.
//!
//! Simulates one visitor's browser session over a JSON-line protocol:
//!   attribution-runner --db shop.db
//!   attribution-runner --ipc-mode < session.jsonl
//!
//! The runner owns the visitor's cookie jar, feeds each storefront event
//! through the pipeline, and mirrors the returned cookie directives back
//! into the jar the way a browser would.

use anyhow::Result;
use attribution_core::{
    clock::Clock,
    pipeline::AttributionPipeline,
    request::{CookieJar, PageRequest},
    settings::SettingsUpdate,
    store::AttributionStore,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    /// A page view: query string plus transport flag.
    Visit {
        query: String,
        #[serde(default = "default_secure")]
        secure: bool,
    },
    /// Render the checkout for the given query string.
    Checkout {
        #[serde(default)]
        query: String,
        #[serde(default = "default_secure")]
        secure: bool,
    },
    /// Post the checkout form. Hidden fields come from the last render
    /// unless supplied explicitly.
    Submit {
        #[serde(default)]
        order_id: Option<String>,
        #[serde(default)]
        fields: Option<Vec<(String, String)>>,
    },
    /// Mark an order completed.
    Complete {
        order_id: String,
        #[serde(default)]
        customer_id: Option<String>,
    },
    /// Apply an admin settings update and reload configuration.
    Settings(SettingsUpdate),
    /// Dump the visitor jar and effective configuration.
    State,
    Quit,
}

fn default_secure() -> bool {
    true
}

#[derive(serde::Serialize)]
struct IpcResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    set_cookie: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<serde_json::Value>,
}

impl IpcResponse {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            order_id: None,
            blocked: None,
            reason: None,
            set_cookie: Vec::new(),
            snapshot: None,
            state: None,
        }
    }

    fn err(message: String) -> Self {
        let mut resp = Self::ok();
        resp.ok = false;
        resp.error = Some(message);
        resp
    }
}

/// The simulated visitor: jar plus the hidden fields of the last
/// checkout render, pending submission.
struct Visitor {
    jar: CookieJar,
    pending_fields: Option<Vec<(String, String)>>,
    secure: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    let store = AttributionStore::open(&db_uri(db))?;
    store.migrate()?;
    let mut pipeline = AttributionPipeline::new(store, Clock::System)?;

    if !ipc_mode {
        println!("attribution-runner");
        println!("  db:      {db}");
        println!("  config:  {}", serde_json::to_string(pipeline.config())?);
        println!();
        println!("Reading JSON-line commands from stdin. Send {{\"type\":\"quit\"}} to exit.");
    }

    let mut visitor = Visitor {
        jar: CookieJar::new(),
        pending_fields: None,
        secure: true,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();
    let mut handle = stdin.lock();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(
                    stdout,
                    "{}",
                    serde_json::to_string(&IpcResponse::err(e.to_string()))?
                )?;
                stdout.flush()?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }
        let response = match handle_command(&mut pipeline, &mut visitor, cmd) {
            Ok(resp) => resp,
            Err(e) => IpcResponse::err(e.to_string()),
        };
        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }

    Ok(())
}

fn handle_command(
    pipeline: &mut AttributionPipeline,
    visitor: &mut Visitor,
    cmd: IpcCommand,
) -> Result<IpcResponse> {
    let mut resp = IpcResponse::ok();
    match cmd {
        IpcCommand::Visit { query, secure } => {
            visitor.secure = secure;
            let request = PageRequest::from_query_string(&query, visitor.jar.clone(), secure);
            let outcome = pipeline.on_page_request(&request)?;
            for action in &outcome.cookie_actions {
                visitor.jar.apply(action);
                resp.set_cookie.push(action.header_value());
            }
            resp.snapshot = Some(serde_json::to_value(&outcome.snapshot)?);
        }
        IpcCommand::Checkout { query, secure } => {
            visitor.secure = secure;
            let request = PageRequest::from_query_string(&query, visitor.jar.clone(), secure);
            let view = pipeline.on_checkout_render(&request)?;
            resp.blocked = Some(view.guard.blocked);
            resp.reason = view.guard.reason;
            visitor.pending_fields = Some(view.hidden_fields);
        }
        IpcCommand::Submit { order_id, fields } => {
            let order_id = order_id.unwrap_or_else(|| format!("order-{}", uuid::Uuid::new_v4()));
            let posted = fields
                .or_else(|| visitor.pending_fields.take())
                .unwrap_or_default();
            let request = PageRequest::from_query_string("", visitor.jar.clone(), visitor.secure);
            let actions = pipeline.on_checkout_submitted(&order_id, &posted, &request)?;
            for action in &actions {
                visitor.jar.apply(action);
                resp.set_cookie.push(action.header_value());
            }
            resp.order_id = Some(order_id);
        }
        IpcCommand::Complete {
            order_id,
            customer_id,
        } => {
            let actions =
                pipeline.on_order_completed(&order_id, customer_id.as_deref(), visitor.secure)?;
            for action in &actions {
                visitor.jar.apply(action);
                resp.set_cookie.push(action.header_value());
            }
            resp.order_id = Some(order_id);
        }
        IpcCommand::Settings(update) => {
            update.apply(pipeline.store())?;
            pipeline.reload_config()?;
            log::info!("configuration reloaded: {:?}", pipeline.config());
        }
        IpcCommand::State => {
            let recent: Vec<serde_json::Value> = pipeline
                .store()
                .recent_events(10)?
                .into_iter()
                .map(|e| serde_json::json!({ "type": e.event_type, "at": e.recorded_at }))
                .collect();
            resp.state = Some(serde_json::json!({
                "cookies": visitor.jar,
                "config": pipeline.config(),
                "events_logged": pipeline.store().event_count()?,
                "recent_events": recent,
            }));
        }
        IpcCommand::Quit => unreachable!("handled by the caller"),
    }
    Ok(resp)
}

/// For :memory: use a SQLite shared-memory URI so a reopened connection
/// would still see the same database.
fn db_uri(db: &str) -> String {
    if db == ":memory:" {
        format!(
            "file:attrib_{}?mode=memory&cache=shared",
            chrono::Utc::now().timestamp()
        )
    } else {
        db.to_string()
    }
}
