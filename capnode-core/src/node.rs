//! The Capnode: dispatcher, outbound path, and the public surface.

use crate::error::RpcError;
use crate::export::serialize;
use crate::import::deserialize;
use crate::msg::Message;
use crate::shape::Shape;
use crate::stream::CapnodeStream;
use crate::tables::{MethodTable, ReplyTable};
use crate::value::ApiValue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Subscription token returned by [`Capnode::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Outbound side of a node: the FIFO queue an attached stream drains.
struct Outbound {
    queue: VecDeque<Message>,
    waker: Option<Waker>,
    /// Epoch of the currently attached stream. Attaching bumps the epoch so
    /// a replaced stream cannot tear the node down when dropped.
    attached: Option<u64>,
    next_epoch: u64,
    closed: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct NodeInner {
    pub(crate) methods: MethodTable,
    pub(crate) replies: ReplyTable,
    outbound: Mutex<Outbound>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    exposed: Mutex<Option<Shape>>,
    init_sent: AtomicBool,
    init_seen: AtomicBool,
    remote_tx: watch::Sender<Option<ApiValue>>,
    remote_rx: watch::Receiver<Option<ApiValue>>,
}

impl NodeInner {
    fn new() -> Self {
        let (remote_tx, remote_rx) = watch::channel(None);
        NodeInner {
            methods: MethodTable::new(),
            replies: ReplyTable::new(),
            outbound: Mutex::new(Outbound {
                queue: VecDeque::new(),
                waker: None,
                attached: None,
                next_epoch: 0,
                closed: false,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            exposed: Mutex::new(None),
            init_sent: AtomicBool::new(false),
            init_seen: AtomicBool::new(false),
            remote_tx,
            remote_rx,
        }
    }

    /// Offer a message to the outbound path: queue it for the attached
    /// stream and fan it out to every listener. While the transport lives,
    /// nothing is dropped; a slow consumer only grows the queue.
    pub(crate) fn send_message(&self, msg: Message) {
        let waker = {
            let mut outbound = lock(&self.outbound);
            if outbound.closed {
                debug!(kind = msg.kind(), "outbound message after teardown, dropping");
                return;
            }
            if outbound.attached.is_some() {
                outbound.queue.push_back(msg.clone());
            }
            outbound.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }

        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&msg);
        }
    }

    pub(crate) fn poll_next_outbound(&self, cx: &mut Context<'_>, epoch: u64) -> Poll<Option<Message>> {
        let mut outbound = lock(&self.outbound);
        if outbound.attached != Some(epoch) {
            return Poll::Ready(None);
        }
        if let Some(msg) = outbound.queue.pop_front() {
            return Poll::Ready(Some(msg));
        }
        outbound.waker = Some(cx.waker().clone());
        Poll::Pending
    }

    /// Register a newly attached stream and return its epoch.
    pub(crate) fn attach_epoch(&self) -> u64 {
        let mut outbound = lock(&self.outbound);
        outbound.next_epoch += 1;
        outbound.attached = Some(outbound.next_epoch);
        outbound.closed = false;
        outbound.next_epoch
    }

    /// Publish the one-time init if an API is exposed and a stream is up.
    pub(crate) fn maybe_send_init(&self) {
        let shape = match &*lock(&self.exposed) {
            Some(shape) => shape.clone(),
            None => return,
        };
        if lock(&self.outbound).attached.is_none() {
            return;
        }
        if self.init_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("publishing init");
        self.send_message(Message::Init { value: shape });
    }

    /// Tear the transport down if `epoch` is still the attached stream.
    /// Every pending reply rejects with a terminal error and the tables
    /// clear; the node itself stays usable for a fresh attach.
    pub(crate) fn close_transport(&self, epoch: u64, reason: &str) {
        let waker = {
            let mut outbound = lock(&self.outbound);
            if outbound.attached != Some(epoch) {
                return;
            }
            outbound.attached = None;
            outbound.closed = true;
            outbound.queue.clear();
            outbound.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        warn!(reason, "transport closed, rejecting pending replies");
        self.replies.reject_all(&RpcError::transport_closed(reason));
        self.methods.clear();
    }

    /// Dispatch one inbound message.
    pub(crate) fn dispatch(node: &Arc<NodeInner>, msg: Message) -> Result<(), RpcError> {
        debug!(kind = msg.kind(), "dispatching inbound message");
        match msg {
            Message::Init { value } => {
                if node.init_seen.swap(true, Ordering::SeqCst) {
                    warn!("repeat init left unapplied");
                    return Err(RpcError::protocol("init received twice"));
                }
                let api = deserialize(node, &value);
                node.remote_tx.send_replace(Some(api));
                Ok(())
            }
            Message::Invocation {
                method_id,
                arguments,
                reply_id,
            } => {
                let Some(function) = node.methods.get(&method_id) else {
                    debug!(%method_id, "invocation for unknown method");
                    node.send_message(Message::Error {
                        method_id: reply_id,
                        value: RpcError::UnknownMethod(method_id).to_payload(),
                    });
                    return Ok(());
                };
                // Function arguments become proxies pointing back at the
                // caller before the method ever sees them.
                let args: Vec<ApiValue> = arguments
                    .iter()
                    .map(|shape| deserialize(node, shape))
                    .collect();
                let node = Arc::clone(node);
                tokio::spawn(async move {
                    match function.call(args).await {
                        Ok(result) => {
                            let value = serialize(&node.methods, &result);
                            node.send_message(Message::Return {
                                method_id: reply_id,
                                value,
                            });
                        }
                        Err(err) => {
                            node.send_message(Message::Error {
                                method_id: reply_id,
                                value: err.to_payload(),
                            });
                        }
                    }
                });
                Ok(())
            }
            Message::Return { method_id, value } => {
                let result = deserialize(node, &value);
                if !node.replies.settle(&method_id, Ok(result)) {
                    debug!(%method_id, "orphan return dropped");
                }
                Ok(())
            }
            Message::Error { method_id, value } => {
                if !node
                    .replies
                    .settle(&method_id, Err(RpcError::from_payload(value)))
                {
                    debug!(%method_id, "orphan error dropped");
                }
                Ok(())
            }
        }
    }
}

/// One endpoint of the RPC runtime.
///
/// A `Capnode` is cheaply cloneable; clones share the method and reply
/// tables, the outbound queue, and the adopted remote API.
#[derive(Clone)]
pub struct Capnode {
    inner: Arc<NodeInner>,
}

impl Capnode {
    pub fn new() -> Self {
        Capnode {
            inner: Arc::new(NodeInner::new()),
        }
    }

    /// Register every function in `api` and return the transmittable shape.
    ///
    /// If a stream is attached and no init has gone out yet, the shape is
    /// published to the peer immediately. Re-exposing replaces the published
    /// shape for future attaches but never unregisters earlier handles.
    pub fn expose(&self, api: ApiValue) -> Shape {
        let shape = serialize(&self.inner.methods, &api);
        *lock(&self.inner.exposed) = Some(shape.clone());
        self.inner.maybe_send_init();
        shape
    }

    /// Reconstruct the local mirror of a received shape. Function leaves
    /// become async proxies bound to this node's peer.
    pub fn adopt(&self, shape: &Shape) -> ApiValue {
        deserialize(&self.inner, shape)
    }

    /// Feed one inbound message.
    ///
    /// Method futures are spawned onto the ambient tokio runtime, so results
    /// are emitted in settlement order and a handler may itself call remote
    /// proxies while later messages are processed. Must be called within a
    /// tokio runtime.
    ///
    /// A protocol anomaly (currently: a repeat init) is reported to the
    /// caller and never echoed to the peer; the session stays live.
    pub fn receive(&self, msg: Message) -> Result<(), RpcError> {
        NodeInner::dispatch(&self.inner, msg)
    }

    /// Subscribe to every outbound message. Listeners are additive with an
    /// attached stream and see messages in offer order.
    pub fn add_listener(&self, listener: impl Fn(&Message) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Attach the object-mode duplex stream, publishing the init if an API
    /// has been exposed. A second attach replaces the first: the old stream
    /// ends and can no longer tear the node down.
    pub fn attach_stream(&self) -> CapnodeStream {
        let epoch = self.inner.attach_epoch();
        let stream = CapnodeStream::new(self.inner.clone(), epoch);
        self.inner.maybe_send_init();
        stream
    }

    /// The remote API adopted from the peer's init, if it has arrived.
    pub fn remote(&self) -> Option<ApiValue> {
        self.inner.remote_rx.borrow().clone()
    }

    /// Wait for the peer's init and return the adopted remote API.
    pub async fn remote_api(&self) -> Result<ApiValue, RpcError> {
        let mut rx = self.inner.remote_rx.clone();
        loop {
            if let Some(api) = rx.borrow_and_update().clone() {
                return Ok(api);
            }
            if rx.changed().await.is_err() {
                return Err(RpcError::transport_closed("node dropped"));
            }
        }
    }

    /// Number of exported functions currently registered.
    pub fn exported_methods(&self) -> usize {
        self.inner.methods.len()
    }

    /// Number of in-flight proxy calls awaiting settlement.
    pub fn pending_replies(&self) -> usize {
        self.inner.replies.len()
    }
}

impl Default for Capnode {
    fn default() -> Self {
        Self::new()
    }
}
