//! In-memory fakes of the ledger, the wallet and contact storage for unit tests.

use crate::config::ChainConfig;
use crate::contacts::{Contact, ContactError, ContactRepository};
use crate::ledger::{
	Address, InclusionReceipt, LedgerClient, LedgerError, Message, PendingTransaction, ZERO_ADDRESS,
};
use crate::rpc::{ProviderError, RpcError, UNRECOGNIZED_CHAIN_CODE, USER_REJECTED_CODE};
use crate::wallet::{WalletEvent, WalletProvider};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, broadcast};

pub(crate) fn addr(byte: u8) -> Address {
	Address::new([byte; 20])
}

/// Message authored by `addr(author)`; recipient byte 0 is the public broadcast.
pub(crate) fn message(author: u8, recipient: u8, text: &str, timestamp_seconds: i64) -> Message {
	Message {
		author: addr(author),
		recipient: if recipient == 0 { ZERO_ADDRESS } else { addr(recipient) },
		text: text.to_string(),
		timestamp: DateTime::<Utc>::from_timestamp(timestamp_seconds, 0).unwrap_or_default(),
	}
}

pub(crate) fn provider_error(code: i64, message: &str) -> ProviderError {
	ProviderError {
		code,
		message: message.to_string(),
		data: None,
	}
}

/// What the fake ledger does with a submitted message.
#[derive(Debug, Clone)]
pub(crate) enum SubmitBehavior {
	/// Accept and include; the message is appended to the board.
	Include,
	/// The wallet refuses to send.
	Refuse(ProviderError),
	/// Sent but reverted on inclusion.
	Revert(Option<String>),
	/// Sent but never included.
	Timeout,
}

pub(crate) struct FakeLedger {
	messages: Mutex<Vec<Message>>,
	count_calls: AtomicUsize,
	message_calls: AtomicUsize,
	submit_calls: AtomicUsize,
	fail_count: AtomicBool,
	fail_at: Mutex<Option<u64>>,
	fetch_hold: Mutex<Option<Arc<Notify>>>,
	fetch_entered: Arc<Notify>,
	submit_hold: Mutex<Option<Arc<Notify>>>,
	submit_entered: Arc<Notify>,
	behavior: Mutex<SubmitBehavior>,
	submitted: Mutex<Vec<(Address, Address, String)>>,
}

impl FakeLedger {
	pub(crate) fn new(messages: Vec<Message>) -> Arc<Self> {
		Arc::new(Self {
			messages: Mutex::new(messages),
			count_calls: AtomicUsize::new(0),
			message_calls: AtomicUsize::new(0),
			submit_calls: AtomicUsize::new(0),
			fail_count: AtomicBool::new(false),
			fail_at: Mutex::new(None),
			fetch_hold: Mutex::new(None),
			fetch_entered: Arc::new(Notify::new()),
			submit_hold: Mutex::new(None),
			submit_entered: Arc::new(Notify::new()),
			behavior: Mutex::new(SubmitBehavior::Include),
			submitted: Mutex::new(Vec::new()),
		})
	}

	pub(crate) fn push(&self, message: Message) {
		self.messages.lock().unwrap().push(message);
	}

	pub(crate) fn set_messages(&self, messages: Vec<Message>) {
		*self.messages.lock().unwrap() = messages;
	}

	pub(crate) fn count_calls(&self) -> usize {
		self.count_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn message_calls(&self) -> usize {
		self.message_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn submit_calls(&self) -> usize {
		self.submit_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn submitted(&self) -> Vec<(Address, Address, String)> {
		self.submitted.lock().unwrap().clone()
	}

	pub(crate) fn fail_count(&self, fail: bool) {
		self.fail_count.store(fail, Ordering::SeqCst);
	}

	pub(crate) fn fail_message_at(&self, index: Option<u64>) {
		*self.fail_at.lock().unwrap() = index;
	}

	/// The next `message()` call waits for `gate` before answering.
	pub(crate) fn hold_next_fetch(&self, gate: Arc<Notify>) {
		*self.fetch_hold.lock().unwrap() = Some(gate);
	}

	/// Notified once a held fetch has started.
	pub(crate) fn fetch_entered(&self) -> Arc<Notify> {
		self.fetch_entered.clone()
	}

	/// The next `submit_message()` call waits for `gate` before answering.
	pub(crate) fn hold_next_submit(&self, gate: Arc<Notify>) {
		*self.submit_hold.lock().unwrap() = Some(gate);
	}

	pub(crate) fn submit_entered(&self) -> Arc<Notify> {
		self.submit_entered.clone()
	}

	pub(crate) fn set_submit_behavior(&self, behavior: SubmitBehavior) {
		*self.behavior.lock().unwrap() = behavior;
	}
}

#[async_trait]
impl LedgerClient for FakeLedger {
	async fn message_count(&self) -> Result<u64, LedgerError> {
		self.count_calls.fetch_add(1, Ordering::SeqCst);
		if self.fail_count.load(Ordering::SeqCst) {
			return Err(RpcError::Provider(provider_error(-32000, "node unavailable")).into());
		}
		Ok(self.messages.lock().unwrap().len() as u64)
	}

	async fn message(&self, index: u64) -> Result<Message, LedgerError> {
		self.message_calls.fetch_add(1, Ordering::SeqCst);

		let gate = self.fetch_hold.lock().unwrap().take();
		if let Some(gate) = gate {
			self.fetch_entered.notify_one();
			gate.notified().await;
		}

		if *self.fail_at.lock().unwrap() == Some(index) {
			return Err(RpcError::Provider(provider_error(-32000, "header not found")).into());
		}
		self.messages
			.lock()
			.unwrap()
			.get(index as usize)
			.cloned()
			.ok_or_else(|| LedgerError::Decode(format!("no message at {}", index)))
	}

	async fn submit_message(
		&self,
		from: &Address,
		recipient: &Address,
		text: &str,
	) -> Result<PendingTransaction, LedgerError> {
		self.submit_calls.fetch_add(1, Ordering::SeqCst);
		self.submitted
			.lock()
			.unwrap()
			.push((*from, *recipient, text.to_string()));

		let gate = self.submit_hold.lock().unwrap().take();
		if let Some(gate) = gate {
			self.submit_entered.notify_one();
			gate.notified().await;
		}

		let behavior = self.behavior.lock().unwrap().clone();
		match behavior {
			SubmitBehavior::Refuse(err) => return Err(RpcError::Provider(err).into()),
			SubmitBehavior::Include => self.push(Message {
				author: *from,
				recipient: *recipient,
				text: text.to_string(),
				timestamp: Utc::now(),
			}),
			SubmitBehavior::Revert(_) | SubmitBehavior::Timeout => {}
		}

		Ok(PendingTransaction {
			hash: format!("0x{:064x}", self.submit_calls()),
			from: *from,
			to: addr(0xcc),
			data: "0x".to_string(),
		})
	}

	async fn wait_for_inclusion(
		&self,
		pending: &PendingTransaction,
	) -> Result<InclusionReceipt, LedgerError> {
		let behavior = self.behavior.lock().unwrap().clone();
		match behavior {
			SubmitBehavior::Revert(reason) => Err(LedgerError::Reverted {
				hash: pending.hash.clone(),
				reason,
			}),
			SubmitBehavior::Timeout => Err(LedgerError::InclusionTimeout(pending.hash.clone())),
			SubmitBehavior::Include | SubmitBehavior::Refuse(_) => Ok(InclusionReceipt {
				hash: pending.hash.clone(),
				block_number: 1,
			}),
		}
	}
}

/// How the fake wallet answers a chain switch request.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SwitchBehavior {
	Accept,
	Reject,
	/// Reports 4902; the follow-up add is accepted or rejected.
	Unrecognized { add_accepted: bool },
}

pub(crate) struct FakeWallet {
	accounts: Vec<Address>,
	authorized: AtomicBool,
	reject_authorization: AtomicBool,
	chain: AtomicU64,
	switch: Mutex<SwitchBehavior>,
	request_accounts_calls: AtomicUsize,
	switch_calls: AtomicUsize,
	add_calls: AtomicUsize,
	authorization_hold: Mutex<Option<Arc<Notify>>>,
	authorization_entered: Arc<Notify>,
	events: broadcast::Sender<WalletEvent>,
}

impl FakeWallet {
	pub(crate) fn new(accounts: Vec<Address>, chain_id: u64) -> Arc<Self> {
		let (events, _) = broadcast::channel(16);
		Arc::new(Self {
			accounts,
			authorized: AtomicBool::new(false),
			reject_authorization: AtomicBool::new(false),
			chain: AtomicU64::new(chain_id),
			switch: Mutex::new(SwitchBehavior::Accept),
			request_accounts_calls: AtomicUsize::new(0),
			switch_calls: AtomicUsize::new(0),
			add_calls: AtomicUsize::new(0),
			authorization_hold: Mutex::new(None),
			authorization_entered: Arc::new(Notify::new()),
			events,
		})
	}

	/// Mark the accounts as already authorized by a previous session.
	pub(crate) fn authorize(&self) {
		self.authorized.store(true, Ordering::SeqCst);
	}

	pub(crate) fn reject_authorization(&self) {
		self.reject_authorization.store(true, Ordering::SeqCst);
	}

	pub(crate) fn set_chain(&self, chain_id: u64) {
		self.chain.store(chain_id, Ordering::SeqCst);
	}

	pub(crate) fn current_chain(&self) -> u64 {
		self.chain.load(Ordering::SeqCst)
	}

	pub(crate) fn set_switch_behavior(&self, behavior: SwitchBehavior) {
		*self.switch.lock().unwrap() = behavior;
	}

	pub(crate) fn hold_authorization(&self, gate: Arc<Notify>) {
		*self.authorization_hold.lock().unwrap() = Some(gate);
	}

	pub(crate) fn authorization_entered(&self) -> Arc<Notify> {
		self.authorization_entered.clone()
	}

	pub(crate) fn request_accounts_calls(&self) -> usize {
		self.request_accounts_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn switch_calls(&self) -> usize {
		self.switch_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn add_calls(&self) -> usize {
		self.add_calls.load(Ordering::SeqCst)
	}

	pub(crate) fn emit(&self, event: WalletEvent) {
		let _ = self.events.send(event);
	}
}

#[async_trait]
impl WalletProvider for FakeWallet {
	async fn request_accounts(&self) -> Result<Vec<Address>, RpcError> {
		self.request_accounts_calls.fetch_add(1, Ordering::SeqCst);

		let gate = self.authorization_hold.lock().unwrap().take();
		if let Some(gate) = gate {
			self.authorization_entered.notify_one();
			gate.notified().await;
		}

		if self.reject_authorization.load(Ordering::SeqCst) {
			return Err(RpcError::Provider(provider_error(
				USER_REJECTED_CODE,
				"User rejected the request.",
			)));
		}
		self.authorized.store(true, Ordering::SeqCst);
		Ok(self.accounts.clone())
	}

	async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
		if self.authorized.load(Ordering::SeqCst) {
			Ok(self.accounts.clone())
		} else {
			Ok(Vec::new())
		}
	}

	async fn chain_id(&self) -> Result<u64, RpcError> {
		Ok(self.current_chain())
	}

	async fn switch_chain(&self, chain_id: u64) -> Result<(), RpcError> {
		self.switch_calls.fetch_add(1, Ordering::SeqCst);
		let behavior = *self.switch.lock().unwrap();
		match behavior {
			SwitchBehavior::Accept => {
				self.set_chain(chain_id);
				Ok(())
			}
			SwitchBehavior::Reject => Err(RpcError::Provider(provider_error(
				USER_REJECTED_CODE,
				"User rejected the request.",
			))),
			SwitchBehavior::Unrecognized { .. } => Err(RpcError::Provider(provider_error(
				UNRECOGNIZED_CHAIN_CODE,
				"Unrecognized chain ID",
			))),
		}
	}

	async fn add_chain(&self, chain: &ChainConfig) -> Result<(), RpcError> {
		self.add_calls.fetch_add(1, Ordering::SeqCst);
		let behavior = *self.switch.lock().unwrap();
		match behavior {
			SwitchBehavior::Unrecognized { add_accepted: true } | SwitchBehavior::Accept => {
				self.set_chain(chain.chain_id);
				Ok(())
			}
			_ => Err(RpcError::Provider(provider_error(
				USER_REJECTED_CODE,
				"User rejected the request.",
			))),
		}
	}

	fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
		self.events.subscribe()
	}
}

/// Contact repository whose writes always fail.
#[derive(Default)]
pub(crate) struct FailingContactRepository {
	pub(crate) initial: Vec<Contact>,
	pub(crate) save_attempts: AtomicUsize,
}

#[async_trait]
impl ContactRepository for FailingContactRepository {
	async fn load(&self) -> Result<Vec<Contact>, ContactError> {
		Ok(self.initial.clone())
	}

	async fn save(&self, _contacts: &[Contact]) -> Result<(), ContactError> {
		self.save_attempts.fetch_add(1, Ordering::SeqCst);
		Err(ContactError::Persistence("storage quota exceeded".to_string()))
	}
}

/// Reply of a `JsonRpcStub` handler: a `result` value or an `error` object.
pub(crate) type StubReply = Result<serde_json::Value, serde_json::Value>;

type StubHandler = dyn Fn(&str, &serde_json::Value) -> StubReply + Send + Sync;

/// Local HTTP JSON-RPC endpoint answering from a handler, for exercising the real clients.
/// Every request gets its own connection.
pub(crate) struct JsonRpcStub {
	url: String,
	calls: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
	task: tokio::task::JoinHandle<()>,
}

impl JsonRpcStub {
	pub(crate) async fn start<F>(handler: F) -> Self
	where
		F: Fn(&str, &serde_json::Value) -> StubReply + Send + Sync + 'static,
	{
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let url = format!("http://{}", listener.local_addr().unwrap());
		let calls = Arc::new(Mutex::new(Vec::new()));
		let handler: Arc<StubHandler> = Arc::new(handler);

		let task = tokio::spawn({
			let calls = calls.clone();
			async move {
				while let Ok((stream, _)) = listener.accept().await {
					tokio::spawn(Self::serve(stream, handler.clone(), calls.clone()));
				}
			}
		});

		Self { url, calls, task }
	}

	async fn serve(
		stream: tokio::net::TcpStream,
		handler: Arc<StubHandler>,
		calls: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
	) {
		use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

		let mut stream = BufReader::new(stream);
		let mut content_length = 0usize;
		loop {
			let mut line = String::new();
			if stream.read_line(&mut line).await.unwrap_or(0) == 0 {
				return;
			}
			let line = line.trim_end();
			if line.is_empty() {
				break;
			}
			if let Some((name, value)) = line.split_once(':') {
				if name.eq_ignore_ascii_case("content-length") {
					content_length = value.trim().parse().unwrap_or(0);
				}
			}
		}

		let mut body = vec![0u8; content_length];
		if stream.read_exact(&mut body).await.is_err() {
			return;
		}
		let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
		let method = request["method"].as_str().unwrap_or_default().to_string();
		let params = request["params"].clone();

		let reply = handler(&method, &params);
		calls.lock().unwrap().push((method, params));

		let mut response = serde_json::json!({ "jsonrpc": "2.0", "id": request["id"].clone() });
		match reply {
			Ok(result) => response["result"] = result,
			Err(error) => response["error"] = error,
		}
		let payload = response.to_string();
		let head = format!(
			"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
			payload.len()
		);
		let stream = stream.get_mut();
		let _ = stream.write_all(head.as_bytes()).await;
		let _ = stream.write_all(payload.as_bytes()).await;
		let _ = stream.shutdown().await;
	}

	pub(crate) fn url(&self) -> &str {
		&self.url
	}

	/// Methods received so far, with their params, in arrival order.
	pub(crate) fn calls(&self) -> Vec<(String, serde_json::Value)> {
		self.calls.lock().unwrap().clone()
	}
}

impl Drop for JsonRpcStub {
	fn drop(&mut self) {
		self.task.abort();
	}
}
