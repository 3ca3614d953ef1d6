use monad_dmail::contacts::{Contact, ContactRepository, FileContactRepository};
use monad_dmail::ledger::{LedgerClient, Message, MessageBoardClient};
use monad_dmail::rpc::{DEFAULT_REQUEST_TIMEOUT, RpcClient};
use monad_dmail::wallet::{ConnectionState, JsonRpcWalletProvider, WalletProvider};
use monad_dmail::{AppConfig, Session, SessionDeps};

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Why the interactive loop returned.
enum Exit {
	Shutdown,
	Reload,
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting message board client");

	let config = match AppConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Invalid configuration: {}", e);
			return;
		}
	};

	let reader = match RpcClient::with_timeout(config.rpc_url.clone(), DEFAULT_REQUEST_TIMEOUT) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create RPC client: {}", e);
			return;
		}
	};

	let (signer, wallet, watcher) = match config.wallet_url.as_deref() {
		Some(url) => match RpcClient::with_timeout(url, DEFAULT_REQUEST_TIMEOUT) {
			Ok(client) => {
				let provider = Arc::new(JsonRpcWalletProvider::new(client.clone()));
				let watcher = provider.watch(config.wallet_watch_interval);
				let provider: Arc<dyn WalletProvider> = provider;
				(Some(client), Some(provider), Some(watcher))
			}
			Err(e) => {
				error!("Failed to create wallet bridge client: {}", e);
				return;
			}
		},
		None => {
			warn!("No wallet bridge configured (DMAIL_WALLET_URL); running read-only");
			(None, None, None)
		}
	};

	let ledger: Arc<dyn LedgerClient> = Arc::new(MessageBoardClient::new(
		reader,
		signer,
		config.contract_address,
		config.inclusion_timeout,
	));
	let contacts: Arc<dyn ContactRepository> =
		Arc::new(FileContactRepository::new(config.contacts_path.clone()));

	info!(
		"Using contract {} on {} via {}",
		config.contract_address, config.chain.chain_name, config.rpc_url
	);

	loop {
		let session = Arc::new(
			Session::init(SessionDeps {
				ledger: ledger.clone(),
				wallet: wallet.clone(),
				contacts: contacts.clone(),
				chain: config.chain.clone(),
				poll_interval: config.poll_interval,
			})
			.await,
		);

		if wallet.is_some() && session.view().connection != ConnectionState::Connected {
			if let Err(e) = session.connect().await {
				warn!("Could not connect wallet: {}", e);
			}
		}

		let exit = run(&session).await;
		session.teardown();

		match exit {
			Exit::Shutdown => break,
			Exit::Reload => info!("Wallet network changed, rebuilding session"),
		}
	}

	if let Some(watcher) = watcher {
		watcher.abort();
	}
	info!("Stopped");
}

/// Print the board as it changes and execute commands read from stdin.
async fn run(session: &Arc<Session>) -> Exit {
	let mut messages = session.subscribe_messages();
	let mut connection = session.subscribe_connection();
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut shown = 0usize;

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("Received Ctrl-C, shutting down");
				return Exit::Shutdown;
			}
			changed = connection.changed() => {
				if changed.is_err() || connection.borrow_and_update().reload_required {
					return Exit::Reload;
				}
			}
			changed = messages.changed() => {
				if changed.is_err() {
					return Exit::Shutdown;
				}
				let current = messages.borrow_and_update().clone();
				shown = print_new(session, &current, shown).await;
			}
			line = lines.next_line() => {
				match line {
					Ok(Some(line)) => handle_command(session, line.trim()).await,
					Ok(None) => return Exit::Shutdown,
					Err(e) => {
						error!("Failed to read stdin: {}", e);
						return Exit::Shutdown;
					}
				}
			}
		}
	}
}

/// Log messages beyond the `shown` newest-first prefix already printed. Returns the new count.
async fn print_new(session: &Session, messages: &[Message], shown: usize) -> usize {
	let fresh = messages.len().saturating_sub(shown);
	for message in messages[..fresh].iter().rev() {
		info!(
			"[{}] {} -> {}: {}",
			message.timestamp.format("%Y-%m-%d %H:%M:%S"),
			session.display_name(&message.author).await,
			session.recipient_label(&message.recipient).await,
			message.text
		);
	}
	messages.len()
}

async fn handle_command(session: &Arc<Session>, line: &str) {
	let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
	match command {
		"" => {}
		"/connect" => match session.connect().await {
			Ok(snapshot) => info!("Connection: {:?}", snapshot.state),
			Err(e) => warn!("Connect failed: {}", e),
		},
		"/refresh" => {
			if let Err(e) = session.refresh().await {
				warn!("Refresh failed: {}", e);
			}
		}
		"/contacts" => {
			for contact in session.contacts().await {
				info!("{} {}", contact.name, contact.address);
			}
		}
		"/add" => match rest.trim().rsplit_once(' ') {
			Some((name, address)) => {
				if let Err(e) = session.add_contact(Contact::new(name, address)).await {
					warn!("{}", e);
				}
			}
			None => warn!("Usage: /add <name> <address>"),
		},
		"/remove" => session.remove_contact(rest.trim()).await,
		"/to" => match rest.trim().split_once(' ') {
			Some((recipient, text)) => post(session, text, recipient),
			None => warn!("Usage: /to <address> <message>"),
		},
		_ if command.starts_with('/') => warn!("Unknown command {}", command),
		_ => post(session, line, ""),
	}
}

/// Posting waits for inclusion, so it runs beside the command loop.
fn post(session: &Arc<Session>, text: &str, recipient: &str) {
	let session = session.clone();
	let text = text.to_string();
	let recipient = recipient.to_string();
	tokio::spawn(async move {
		match session.submit(&text, &recipient).await {
			Ok(receipt) => info!("Message included in block {}", receipt.block_number),
			Err(e) => warn!("Message not posted: {}", e),
		}
	});
}
