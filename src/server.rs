//! Illustrative, non-normative HTTP surface: `POST /eval` evaluates a
//! form-encoded expression and returns its printed form or error message
//! as JSON; `GET /completions?name=` lists root-env names sharing a
//! prefix. Like the REPL, this is one conformant embedding among many —
//! any embedder that threads expressions in and stringifies results out
//! is conformant.

use std::io::Read as _;

use log::info;
use serde::Serialize;
use tiny_http::{Method, Response, Server};

use crate::error::PolyError;
use crate::node::Node;
use crate::parser::read_expr;

#[derive(Serialize)]
#[serde(tag = "type")]
enum EvalResponse {
    #[serde(rename = "expr")]
    Expr { value: String },
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Serialize)]
struct CompletionsResponse {
    values: Vec<String>,
}

pub fn run(port: u16, prelude: Option<&str>) -> crate::error::Result<()> {
    let node = Node::new("server");
    if let Some(path) = prelude {
        if let Err(e) = node.load_module(path, Some("")) {
            log::error!("prelude failed to load: {}", e);
        }
    }

    let addr = format!("0.0.0.0:{}", port);
    let server =
        Server::http(&addr).map_err(|e| PolyError::Reader(format!("can't bind {}: {}", addr, e)))?;
    info!("listening on {}", addr);

    for mut request in server.incoming_requests() {
        let url = request.url().to_string();
        let path = url.split('?').next().unwrap_or("").to_string();

        let response_json = match (request.method(), path.as_str()) {
            (Method::Post, "/eval") => {
                let mut body = String::new();
                if request.as_reader().read_to_string(&mut body).is_err() {
                    body.clear();
                }
                let input = form_field(&body, "input");
                match input {
                    Some(input) => handle_eval(&node, &input),
                    None => serde_json::to_string(&EvalResponse::Error {
                        message: "No input given".to_string(),
                    })
                    .unwrap(),
                }
            }
            (Method::Get, "/completions") => {
                let query = url.splitn(2, '?').nth(1).unwrap_or("");
                match query_field(query, "name") {
                    Some(name) if name.chars().count() >= 3 => {
                        let mut matches: Vec<String> = node
                            .names()
                            .iter()
                            .map(|n| n.to_string())
                            .filter(|n| n.starts_with(&name))
                            .collect();
                        matches.sort();
                        serde_json::to_string(&CompletionsResponse { values: matches }).unwrap()
                    }
                    Some(_) => serde_json::to_string(&EvalResponse::Error {
                        message: "Input must be at least 3 characters".to_string(),
                    })
                    .unwrap(),
                    None => serde_json::to_string(&EvalResponse::Error {
                        message: "No input given".to_string(),
                    })
                    .unwrap(),
                }
            }
            _ => serde_json::to_string(&EvalResponse::Error {
                message: "Not found".to_string(),
            })
            .unwrap(),
        };

        let response = Response::from_string(response_json)
            .with_header(tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
        let _ = request.respond(response);
    }

    Ok(())
}

fn handle_eval(node: &Node, input: &str) -> String {
    let result = read_expr(input.trim()).and_then(|expr| node.eval(&expr));
    let resp = match result {
        Ok(val) => EvalResponse::Expr {
            value: val.to_string(),
        },
        Err(e) => EvalResponse::Error {
            message: e.to_string(),
        },
    };
    serde_json::to_string(&resp).unwrap()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                // Slice the raw bytes, not `s`: `s[i+1..i+3]` would panic
                // if a multi-byte UTF-8 character follows a stray `%`,
                // since that range wouldn't land on a char boundary.
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn form_field(body: &str, key: &str) -> Option<String> {
    query_field(body, key)
}

fn query_field(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let mut parts = pair.splitn(2, '=');
        let k = parts.next()?;
        let v = parts.next().unwrap_or("");
        if k == key {
            Some(percent_decode(v))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_percent_and_plus_encoding() {
        assert_eq!(percent_decode("a+b%20c"), "a b c");
    }

    #[test]
    fn extracts_named_field() {
        assert_eq!(form_field("input=%281+2%29&x=1", "input"), Some("(1 2)".to_string()));
        assert_eq!(form_field("x=1", "input"), None);
    }
}
