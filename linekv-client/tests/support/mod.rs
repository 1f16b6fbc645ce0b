//! In-process server speaking the line protocol, backed by an in-memory
//! key space. Scripted enough to exercise the client end to end without a
//! real server.

use bytes::BytesMut;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

const DB_COUNT: usize = 16;

pub struct MockServer {
    pub addr: SocketAddr,
}

struct State {
    dbs: Vec<HashMap<String, Vec<u8>>>,
    ttls: HashMap<(usize, String), i64>,
    password: Option<String>,
}

pub async fn spawn() -> MockServer {
    spawn_with_password(None).await
}

pub async fn spawn_with_password(password: Option<&str>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(Mutex::new(State {
        dbs: vec![HashMap::new(); DB_COUNT],
        ttls: HashMap::new(),
        password: password.map(str::to_string),
    }));

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(handle(stream, state.clone()));
        }
    });

    MockServer { addr }
}

struct Session {
    db: usize,
    authed: bool,
}

async fn handle(mut stream: TcpStream, state: Arc<Mutex<State>>) {
    let mut buf = BytesMut::with_capacity(4096);
    let mut session = Session {
        db: 0,
        authed: false,
    };

    loop {
        let Some((tokens, payload)) = read_command(&mut stream, &mut buf).await else {
            return;
        };
        if tokens.is_empty() {
            continue;
        }

        let verb = tokens[0].to_ascii_uppercase();
        let reply = dispatch(&verb, &tokens[1..], payload, &mut session, &state).await;
        if stream.write_all(&reply).await.is_err() {
            return;
        }
        if verb == "QUIT" {
            return;
        }
    }
}

/// Reads one command line; SET-style verbs carry a length-prefixed payload
/// after the line.
async fn read_command(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
) -> Option<(Vec<String>, Option<Vec<u8>>)> {
    let line = read_line(stream, buf).await?;
    let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();

    let verb = tokens.first()?.to_ascii_uppercase();
    if matches!(verb.as_str(), "SET" | "GETSET" | "APPEND") {
        let len: usize = tokens.last()?.parse().ok()?;
        let payload = read_exact(stream, buf, len + 2).await?;
        return Some((tokens, Some(payload[..len].to_vec())));
    }

    Some((tokens, None))
}

async fn read_line(stream: &mut TcpStream, buf: &mut BytesMut) -> Option<String> {
    loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            let line = String::from_utf8_lossy(&buf[..pos]).into_owned();
            let _ = buf.split_to(pos + 2);
            return Some(line);
        }
        if !fill(stream, buf).await {
            return None;
        }
    }
}

async fn read_exact(stream: &mut TcpStream, buf: &mut BytesMut, n: usize) -> Option<Vec<u8>> {
    while buf.len() < n {
        if !fill(stream, buf).await {
            return None;
        }
    }
    Some(buf.split_to(n).to_vec())
}

async fn fill(stream: &mut TcpStream, buf: &mut BytesMut) -> bool {
    let mut chunk = [0u8; 1024];
    match stream.read(&mut chunk).await {
        Ok(0) | Err(_) => false,
        Ok(n) => {
            buf.extend_from_slice(&chunk[..n]);
            true
        }
    }
}

async fn dispatch(
    verb: &str,
    args: &[String],
    payload: Option<Vec<u8>>,
    session: &mut Session,
    state: &Arc<Mutex<State>>,
) -> Vec<u8> {
    let mut state = state.lock().await;

    if verb == "AUTH" {
        return match (&state.password, args.first()) {
            (Some(expected), Some(given)) if expected == given => {
                session.authed = true;
                status("OK")
            }
            _ => error("invalid password"),
        };
    }
    if state.password.is_some() && !session.authed && verb != "QUIT" {
        return error("operation not permitted");
    }

    let db = session.db;
    match verb {
        "PING" => status("PONG"),
        "QUIT" => status("OK"),

        "SET" => {
            state.dbs[db].insert(args[0].clone(), payload.unwrap_or_default());
            status("OK")
        }
        "GET" => bulk(state.dbs[db].get(&args[0]).map(Vec::as_slice)),
        "DEL" => {
            let removed = state.dbs[db].remove(&args[0]).is_some();
            integer(removed as i64)
        }
        "EXISTS" => integer(state.dbs[db].contains_key(&args[0]) as i64),
        "RENAME" => match state.dbs[db].remove(&args[0]) {
            Some(value) => {
                state.dbs[db].insert(args[1].clone(), value);
                status("OK")
            }
            None => error("no such key"),
        },
        "EXPIRE" | "EXPIREAT" => {
            if state.dbs[db].contains_key(&args[0]) {
                let secs: i64 = args[1].parse().unwrap_or(0);
                state.ttls.insert((db, args[0].clone()), secs);
                integer(1)
            } else {
                integer(0)
            }
        }
        "TTL" => integer(
            state
                .ttls
                .get(&(db, args[0].clone()))
                .copied()
                .unwrap_or(-1),
        ),
        "KEYS" => {
            let mut keys: Vec<&String> = state.dbs[db]
                .keys()
                .filter(|k| glob_match(args[0].as_bytes(), k.as_bytes()))
                .collect();
            keys.sort();
            let mut out = format!("*{}\r\n", keys.len()).into_bytes();
            for key in keys {
                out.extend_from_slice(&bulk(Some(key.as_bytes())));
            }
            out
        }
        "DBSIZE" => integer(state.dbs[db].len() as i64),
        "FLUSHDB" => {
            state.dbs[db].clear();
            status("OK")
        }
        "FLUSHALL" => {
            for d in &mut state.dbs {
                d.clear();
            }
            status("OK")
        }
        "SELECT" => match args[0].parse::<usize>() {
            Ok(id) if id < DB_COUNT => {
                session.db = id;
                status("OK")
            }
            _ => error("invalid DB index"),
        },
        "MOVE" => {
            let target: usize = args[1].parse().unwrap_or(0);
            let movable = target < DB_COUNT
                && state.dbs[db].contains_key(&args[0])
                && !state.dbs[target].contains_key(&args[0]);
            if movable {
                let value = state.dbs[db].remove(&args[0]).unwrap();
                state.dbs[target].insert(args[0].clone(), value);
                integer(1)
            } else {
                integer(0)
            }
        }
        "MGET" => {
            let mut out = format!("*{}\r\n", args.len()).into_bytes();
            for key in args {
                out.extend_from_slice(&bulk(state.dbs[db].get(key).map(Vec::as_slice)));
            }
            out
        }
        "GETSET" => {
            let old = state.dbs[db].insert(args[0].clone(), payload.unwrap_or_default());
            bulk(old.as_deref())
        }
        "INCR" | "INCRBY" | "DECR" | "DECRBY" => {
            let amount = match verb {
                "INCR" => 1,
                "DECR" => -1,
                "INCRBY" => args[1].parse().unwrap_or(1),
                _ => -args[1].parse().unwrap_or(1),
            };
            let current = match state.dbs[db].get(&args[0]) {
                None => 0,
                Some(bytes) => match std::str::from_utf8(bytes).ok().and_then(|s| s.parse().ok()) {
                    Some(n) => n,
                    None => return error("value is not an integer or out of range"),
                },
            };
            let next: i64 = current + amount;
            state.dbs[db].insert(args[0].clone(), next.to_string().into_bytes());
            integer(next)
        }
        "APPEND" => {
            let entry = state.dbs[db].entry(args[0].clone()).or_default();
            entry.extend_from_slice(&payload.unwrap_or_default());
            integer(entry.len() as i64)
        }
        "SUBSTR" => match state.dbs[db].get(&args[0]) {
            None => bulk(None),
            Some(bytes) => {
                let len = bytes.len() as i64;
                let wrap = |i: i64| if i < 0 { len + i } else { i };
                let start = wrap(args[1].parse().unwrap_or(0)).clamp(0, len);
                // End index is inclusive.
                let end = (wrap(args[2].parse().unwrap_or(-1)) + 1).clamp(start, len);
                bulk(Some(&bytes[start as usize..end as usize]))
            }
        },
        "SAVE" => status("OK"),
        "BGSAVE" => status("Background saving started"),
        "LASTSAVE" => integer(1_300_000_000),
        "MULTI" | "DISCARD" | "WATCH" | "UNWATCH" => status("OK"),
        "EXEC" => b"*0\r\n".to_vec(),

        other => error(&format!("unknown command '{other}'")),
    }
}

fn status(text: &str) -> Vec<u8> {
    format!("+{text}\r\n").into_bytes()
}

fn error(text: &str) -> Vec<u8> {
    format!("-ERR {text}\r\n").into_bytes()
}

fn integer(n: i64) -> Vec<u8> {
    format!(":{n}\r\n").into_bytes()
}

fn bulk(payload: Option<&[u8]>) -> Vec<u8> {
    match payload {
        Some(bytes) => {
            let mut out = format!("${}\r\n", bytes.len()).into_bytes();
            out.extend_from_slice(bytes);
            out.extend_from_slice(b"\r\n");
            out
        }
        None => b"$-1\r\n".to_vec(),
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text)
                || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}
