//! Test doubles shared by the unit tests.

use crate::listener::Accept;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A handle that counts how many times it has been closed.
#[derive(Debug)]
pub struct Tracked {
    pub id: usize,
    closes: Arc<AtomicUsize>,
}

impl Tracked {
    pub fn new(id: usize) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Tracked {
                id,
                closes: Arc::clone(&closes),
            },
            closes,
        )
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Accept(usize),
    Offer(usize, bool),
}

pub type Log = Arc<Mutex<Vec<Event>>>;

/// Listener that replays a fixed script of accept results, then fails.
pub struct ScriptedListener {
    script: Mutex<VecDeque<io::Result<usize>>>,
    closes: Mutex<HashMap<usize, Arc<AtomicUsize>>>,
    log: Log,
}

impl ScriptedListener {
    pub fn new(script: Vec<io::Result<usize>>, log: &Log) -> Self {
        Self {
            script: Mutex::new(script.into()),
            closes: Mutex::new(HashMap::new()),
            log: Arc::clone(log),
        }
    }

    /// Close count of the handle accepted with `id`.
    pub fn closes(&self, id: usize) -> usize {
        self.closes.lock().unwrap()[&id].load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl Accept for ScriptedListener {
    type Conn = Tracked;

    fn accept(&self) -> io::Result<(Tracked, SocketAddr)> {
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::other("listener closed")));
        let id = next?;

        let (handle, closes) = Tracked::new(id);
        self.closes.lock().unwrap().insert(id, closes);
        self.log.lock().unwrap().push(Event::Accept(id));

        let peer = SocketAddr::from((Ipv6Addr::LOCALHOST, 40000 + id as u16));
        Ok((handle, peer))
    }
}
