//! Terminal chat front end.
//!
//! Reads one request per line, routes it onto an OHIP tool by keyword and
//! prints the resulting envelope. Arguments are given as `key=value` pairs,
//! e.g. `claims patient_id=12345 start_date=2025-01-01`.

mod intent;

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::{
    chat::intent::{Intent, Utterance},
    mcp::{OhipMcpServer, envelope::Envelope, tools},
};

const HELP: &str = "\
Ask for an OHIP operation and pass details as key=value pairs, for example:
  find patient last_name=Doe date_of_birth=1980-04-23
  claims patient_id=12345 start_date=2025-01-01 end_date=2025-06-30
  submit claim patient_id=12345 provider_id=dr-7 service_code=A001 service_date=2025-09-11 amount=33.70
  test oauth token
  test connection
Other commands: tools, help, quit";

#[derive(Debug, PartialEq)]
pub enum Reply {
    Text(String),
    Quit,
}

pub async fn run(server: OhipMcpServer) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("OHIP assistant. {HELP}\n").as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match respond(&server, &line).await {
            Reply::Quit => break,
            Reply::Text(text) => {
                stdout.write_all(text.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
            }
        }
    }

    info!("Chat session ended");
    Ok(())
}

/// Answers one chat line.
pub async fn respond(server: &OhipMcpServer, line: &str) -> Reply {
    let utterance = Utterance::parse(line);

    match utterance.intent() {
        Intent::Quit => Reply::Quit,
        Intent::Help => Reply::Text(HELP.to_string()),
        Intent::ListTools => Reply::Text(
            server
                .tools()
                .iter()
                .map(|tool| {
                    format!(
                        "{}: {}",
                        tool.name,
                        tool.description.as_deref().unwrap_or_default()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Intent::Unknown => Reply::Text(format!(
            "I can only help with OHIP patient, claims and connection requests.\n{HELP}"
        )),
        Intent::Tool(tool) => {
            info!(%tool, "Routing chat request");
            let result = tools::invoke(server.client(), tool, Value::Object(utterance.arguments)).await;
            let envelope = Envelope::from_result(result);
            if !envelope.is_success() {
                warn!(%tool, message = %envelope.message, "Tool call failed");
            }
            Reply::Text(
                serde_json::to_string_pretty(&envelope).unwrap_or_else(|e| format!("Error: {e}")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::http::client::tests::{client, mount_token};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{any, method, path, query_param},
    };

    fn reply_json(reply: Reply) -> Value {
        match reply {
            Reply::Text(text) => serde_json::from_str(&text).unwrap(),
            Reply::Quit => Value::Null,
        }
    }

    #[tokio::test]
    async fn routes_claims_request_to_api() {
        let server = MockServer::start().await;
        mount_token(&server, "tok", 1).await;
        Mock::given(method("GET"))
            .and(path("/patients/12345/claims"))
            .and(query_param("start_date", "2025-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "claim_id": "c1" }])))
            .expect(1)
            .mount(&server)
            .await;

        let mcp = OhipMcpServer::new(client(&server));
        let reply = respond(&mcp, "show claims patient_id=12345 start_date=2025-01-01").await;
        let envelope = reply_json(reply);
        assert_eq!(envelope["status"], "success");
        assert_eq!(envelope["data"][0]["claim_id"], "c1");
    }

    #[tokio::test]
    async fn incomplete_claim_reports_validation_failure() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mcp = OhipMcpServer::new(client(&server));
        let reply = respond(&mcp, "submit claim patient_id=12345 amount=10").await;
        let envelope = reply_json(reply);
        assert_eq!(envelope["status"], "error");
        assert_eq!(envelope["error"]["kind"], "validation_failure");
    }

    #[tokio::test]
    async fn builtins_do_not_touch_the_network() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mcp = OhipMcpServer::new(client(&server));
        assert_eq!(respond(&mcp, "quit").await, Reply::Quit);
        assert!(matches!(respond(&mcp, "help").await, Reply::Text(t) if t.contains("key=value")));
        assert!(
            matches!(respond(&mcp, "tools").await, Reply::Text(t) if t.contains("ohip_submit_claim"))
        );
        assert!(
            matches!(respond(&mcp, "tell me a joke").await, Reply::Text(t) if t.contains("only help"))
        );
    }
}
