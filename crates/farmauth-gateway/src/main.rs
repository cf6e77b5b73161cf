//! farmauth policy dry-run.
//!
//! Usage: `farmauth-gateway [config.yaml] < queries.txt`
//!
//! Each input line is `subject resource action object org`; use `-` for "no
//! specific object". Prints the decision and the deciding rule for every
//! line, then the gateway metrics.

use std::io::{self, BufRead};
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use farmauth_core::{AccessRequest, RequestContext};
use farmauth_gateway::{config, AuthorizationGateway};

fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "farmauth.yaml".to_string());
    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(%path, error = %e, "config load failed");
            return ExitCode::FAILURE;
        }
    };
    let gateway = match AuthorizationGateway::from_config(&cfg) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, "gateway build failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%path, rules = gateway.matrix().len(), "farmauth dry-run ready");

    let stdin = io::stdin();
    for (n, line) in stdin.lock().lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                return ExitCode::FAILURE;
            }
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [subject, resource, action, object, org] = fields[..] else {
            eprintln!("line {}: expected `subject resource action object org`", n + 1);
            continue;
        };
        let object = if object == "-" { "" } else { object };

        let ctx = RequestContext::with_request_id(format!("dry-run:{}", n + 1));
        let req = AccessRequest::new(subject, resource, action, object, org);
        match gateway.decide(&ctx, &req) {
            Ok(decision) => {
                let why = decision
                    .matched
                    .and_then(|seq| gateway.matrix().rule(seq))
                    .map_or_else(|| "default".to_string(), |rule| rule.to_string());
                println!("{line} => {} ({why})", decision.effect);
            }
            Err(e) => println!("{line} => refused: {e} [{}]", e.client_code().as_str()),
        }
    }

    print!("{}", gateway.render_metrics());
    ExitCode::SUCCESS
}
