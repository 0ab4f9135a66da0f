//! In-process HandlerSocket stand-in for integration tests.
//!
//! Serves the subset of the protocol the client speaks (open index, find,
//! find-modify, insert) against an in-memory [`Store`] that several servers can
//! share, and can be told to drop a connection mid-request.
#![allow(dead_code)]

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    io::{BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
    },
    thread::{self, JoinHandle},
};

use hsclient::{
    ServerEndpoint,
    protocol::codec::{decode, encode},
};

type Record = BTreeMap<String, Option<String>>;

/// Tables keyed by `(db, table)`, shared between servers.
#[derive(Clone, Default)]
pub struct Store(Arc<Mutex<HashMap<(String, String), Vec<Record>>>>);

#[derive(Debug, Clone)]
struct OpenIndex {
    db: String,
    table: String,
    /// Column the index is on: `id` for `PRIMARY`, else the index name.
    key: String,
    fields: Vec<String>,
}

enum Bind {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

struct Shared {
    bind: Bind,
    store: Store,
    stopped: AtomicBool,
    close_next: AtomicBool,
    accepted: AtomicUsize,
    opens: AtomicUsize,
    requests: AtomicUsize,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    /// Stops accepting; connections attempted afterwards are refused.
    fn stop_listening(&self) {
        if self.stopped.swap(true, AtomicOrdering::SeqCst) {
            return;
        }
        // Wake the acceptor so it sees the flag and drops the listener.
        match &self.bind {
            Bind::Tcp(addr) => drop(TcpStream::connect(addr)),
            Bind::Unix(path) => drop(UnixStream::connect(path)),
        }
        if let Some(handle) = self.acceptor.lock().unwrap().take() {
            handle.join().unwrap();
        }
    }
}

pub struct MockServer {
    shared: Arc<Shared>,
}

impl MockServer {
    pub fn start() -> Self {
        Self::start_with(Store::default())
    }

    pub fn start_with(store: Store) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let shared = Self::shared(Bind::Tcp(listener.local_addr().unwrap()), store);

        let state = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            for stream in listener.incoming() {
                if state.stopped.load(AtomicOrdering::SeqCst) {
                    break;
                }
                if let Ok(stream) = stream {
                    stream.set_nodelay(true).unwrap();
                    spawn_handler(stream, Arc::clone(&state));
                }
            }
        });
        *shared.acceptor.lock().unwrap() = Some(handle);

        Self { shared }
    }

    pub fn start_unix(path: &Path, store: Store) -> Self {
        let listener = UnixListener::bind(path).unwrap();
        let shared = Self::shared(Bind::Unix(path.to_path_buf()), store);

        let state = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            for stream in listener.incoming() {
                if state.stopped.load(AtomicOrdering::SeqCst) {
                    break;
                }
                if let Ok(stream) = stream {
                    spawn_handler(stream, Arc::clone(&state));
                }
            }
        });
        *shared.acceptor.lock().unwrap() = Some(handle);

        Self { shared }
    }

    fn shared(bind: Bind, store: Store) -> Arc<Shared> {
        Arc::new(Shared {
            bind,
            store,
            stopped: AtomicBool::new(false),
            close_next: AtomicBool::new(false),
            accepted: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            acceptor: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> ServerEndpoint {
        match &self.shared.bind {
            Bind::Tcp(addr) => ServerEndpoint::inet(addr.ip().to_string(), addr.port()),
            Bind::Unix(path) => ServerEndpoint::unix(path),
        }
    }

    /// The next request is read, then the connection is closed without a reply
    /// and the server stops accepting connections.
    pub fn die_on_next_request(&self) {
        self.shared.close_next.store(true, AtomicOrdering::SeqCst);
    }

    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(AtomicOrdering::SeqCst)
    }

    /// Open-index requests served.
    pub fn opens(&self) -> usize {
        self.shared.opens.load(AtomicOrdering::SeqCst)
    }

    /// All requests received, including the one a scripted failure swallowed.
    pub fn requests(&self) -> usize {
        self.shared.requests.load(AtomicOrdering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shared.stop_listening();
    }
}

fn spawn_handler<S: Read + Write + Send + 'static>(stream: S, shared: Arc<Shared>) {
    shared.accepted.fetch_add(1, AtomicOrdering::SeqCst);
    thread::spawn(move || handle_connection(stream, shared));
}

fn handle_connection<S: Read + Write>(stream: S, shared: Arc<Shared>) {
    let mut reader = BufReader::new(stream);
    let mut indexes: HashMap<usize, OpenIndex> = HashMap::new();

    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        shared.requests.fetch_add(1, AtomicOrdering::SeqCst);

        if shared.close_next.swap(false, AtomicOrdering::SeqCst) {
            shared.stop_listening();
            return;
        }

        let mut resp = respond(&shared, &mut indexes, &line);
        resp.push(b'\n');
        if reader.get_mut().write_all(&resp).is_err() {
            return;
        }
    }
}

fn text(token: &[u8]) -> String {
    String::from_utf8_lossy(token).into_owned()
}

fn value(token: &[u8]) -> Option<String> {
    decode(token).map(|v| String::from_utf8_lossy(&v).into_owned())
}

fn compare(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.parse::<i64>(), b.parse::<i64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => a.cmp(b),
        },
        _ => a.cmp(b),
    }
}

fn error(code: u8, msg: &str) -> Vec<u8> {
    format!("{code}\t1\t{msg}").into_bytes()
}

fn rows_response(fields: &[String], rows: &[Record]) -> Vec<u8> {
    let mut out = format!("0\t{}", fields.len()).into_bytes();
    for row in rows {
        for field in fields {
            out.push(b'\t');
            let v = row.get(field).cloned().flatten();
            out.extend(encode(v.as_deref().map(str::as_bytes)));
        }
    }
    out
}

fn respond(shared: &Shared, indexes: &mut HashMap<usize, OpenIndex>, line: &[u8]) -> Vec<u8> {
    let tokens = line.split(|b| *b == b'\t').collect::<Vec<&[u8]>>();

    if tokens[0] == b"P" {
        if tokens.len() != 6 {
            return error(1, "syntax");
        }
        let Ok(id) = text(tokens[1]).parse::<usize>() else {
            return error(1, "syntax");
        };
        let db = value(tokens[2]).unwrap_or_default();
        if db == "missing" {
            return error(1, "open_table");
        }
        let index_name = value(tokens[4]).unwrap_or_default();
        let index = OpenIndex {
            db,
            table: value(tokens[3]).unwrap_or_default(),
            key: if index_name == "PRIMARY" {
                "id".to_string()
            } else {
                index_name
            },
            fields: value(tokens[5])
                .unwrap_or_default()
                .split(',')
                .map(str::to_string)
                .collect(),
        };
        indexes.insert(id, index);
        shared.opens.fetch_add(1, AtomicOrdering::SeqCst);
        return b"0\t1".to_vec();
    }

    let Some(index) = text(tokens[0])
        .parse::<usize>()
        .ok()
        .and_then(|id| indexes.get(&id))
    else {
        return error(2, "stmtnum");
    };
    let Some(n) = tokens.get(2).and_then(|t| text(t).parse::<usize>().ok()) else {
        return error(1, "syntax");
    };
    let op = text(tokens[1]);

    let mut store = shared.store.0.lock().unwrap();
    let table = store
        .entry((index.db.clone(), index.table.clone()))
        .or_default();
    let key_field = &index.key;

    if op == "+" {
        if tokens.len() != 3 + n || n > index.fields.len() {
            return error(1, "syntax");
        }
        let record = index
            .fields
            .iter()
            .zip(&tokens[3..])
            .map(|(f, t)| (f.clone(), value(t)))
            .collect::<Record>();
        if record.contains_key(key_field)
            && table.iter().any(|r| r.get(key_field) == record.get(key_field))
        {
            return error(1, "121");
        }
        table.push(record);
        return b"0\t1".to_vec();
    }

    if tokens.len() < 5 + n {
        return error(1, "syntax");
    }
    let key = value(tokens[3]);
    let limit = text(tokens[3 + n]).parse::<usize>().unwrap_or(1);
    let offset = text(tokens[4 + n]).parse::<usize>().unwrap_or(0);

    let mut matched = (0..table.len())
        .filter(|i| {
            let ord = compare(&table[*i].get(key_field).cloned().flatten(), &key);
            match op.as_str() {
                "=" => ord == Ordering::Equal,
                ">" => ord == Ordering::Greater,
                ">=" => ord != Ordering::Less,
                "<" => ord == Ordering::Less,
                "<=" => ord != Ordering::Greater,
                _ => false,
            }
        })
        .collect::<Vec<usize>>();
    matched.sort_by(|a, b| {
        compare(
            &table[*a].get(key_field).cloned().flatten(),
            &table[*b].get(key_field).cloned().flatten(),
        )
    });
    if matches!(op.as_str(), "<" | "<=") {
        matched.reverse();
    }
    let matched = matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .collect::<Vec<usize>>();
    let originals = matched.iter().map(|i| table[*i].clone()).collect::<Vec<_>>();

    let Some(modify) = tokens.get(5 + n).map(|t| text(t)) else {
        return rows_response(&index.fields, &originals);
    };
    let modify_values = tokens[6 + n..]
        .iter()
        .map(|t| value(t))
        .collect::<Vec<_>>();
    let (kind, return_original) = match modify.strip_suffix('?') {
        Some(kind) => (kind.to_string(), true),
        None => (modify.clone(), false),
    };

    match kind.as_str() {
        "U" => {
            for i in &matched {
                for (field, v) in index.fields.iter().zip(&modify_values) {
                    table[*i].insert(field.clone(), v.clone());
                }
            }
        }
        "+" | "-" => {
            for i in &matched {
                for (field, step) in index.fields.iter().zip(&modify_values) {
                    let current = table[*i]
                        .get(field)
                        .cloned()
                        .flatten()
                        .and_then(|v| v.parse::<i64>().ok())
                        .unwrap_or(0);
                    let step = step
                        .as_deref()
                        .and_then(|v| v.parse::<i64>().ok())
                        .unwrap_or(0);
                    let next = if kind == "+" { current + step } else { current - step };
                    table[*i].insert(field.clone(), Some(next.to_string()));
                }
            }
        }
        "D" => {
            let mut doomed = matched.clone();
            doomed.sort_unstable();
            for i in doomed.into_iter().rev() {
                table.remove(i);
            }
        }
        _ => return error(1, "op"),
    }

    if return_original {
        rows_response(&index.fields, &originals)
    } else {
        format!("0\t1\t{}", matched.len()).into_bytes()
    }
}
