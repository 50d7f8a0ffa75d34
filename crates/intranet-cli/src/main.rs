mod commands;
mod config;
mod render;
mod sends;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

use intranet_chat::{
    AuthSession, ChatView, Draft, LoadOutcome, LocalFile, PendingSend, ScrollCommand,
};
use intranet_http::{HttpFileStorage, PushGateway, RestMessageService, TokenSession};
use intranet_types::events::PushEvent;

use crate::commands::{Command, HELP};
use crate::config::ClientConfig;
use crate::sends::InFlight;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr, chat output to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intranet=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    let session = Arc::new(
        TokenSession::from_token(config.token.clone())
            .context("INTRANET_TOKEN is not a valid access token")?,
    );
    let me = session.user_id();

    // Collaborators
    let http = reqwest::Client::new();
    let service = Arc::new(RestMessageService::new(
        http.clone(),
        config.api_url.clone(),
        session.clone(),
    ));
    let storage = Arc::new(HttpFileStorage::new(http, config.api_url.clone()));
    let view = ChatView::new(config.chat.clone(), service, storage, session.clone());

    let count = view.refresh_channels().await?;
    info!(username = session.username(), channels = count, "Signed in");

    let channel_ids: Vec<Uuid> = view
        .snapshot()
        .channels
        .iter()
        .map(|entry| entry.channel.id)
        .collect();
    let mut events = PushGateway::new(config.gateway_url.clone(), session.clone(), channel_ids)
        .spawn(256);

    if let Some(channel) = &config.channel {
        join(&view, channel, me).await;
    } else {
        println!("{}", render::channel_list(&view.snapshot()));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft = Draft::default();
    let mut in_flight = InFlight::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = commands::parse(&line) else { continue };
                if command == Command::Quit {
                    break;
                }
                if let Some(pending) = handle(&view, &mut draft, command, me).await {
                    in_flight.start(view.finish_send(pending));
                }
            }
            Some(event) = events.recv() => on_push(&view, event, me).await,
            Some((outcome, _)) = in_flight.next(), if !in_flight.is_empty() => {
                println!("{}", render::send_summary(&outcome));
            }
        }
    }
    if !in_flight.is_empty() {
        info!(sends = in_flight.len(), "Waiting for uploads");
        while let Some((outcome, _)) = in_flight.next().await {
            println!("{}", render::send_summary(&outcome));
        }
    }

    view.close();
    info!("Bye");
    Ok(())
}

/// Returns a send whose uploads still have to finish.
async fn handle(
    view: &ChatView,
    draft: &mut Draft,
    command: Command,
    me: Option<Uuid>,
) -> Option<PendingSend> {
    match command {
        Command::Channels => {
            if let Err(e) = view.refresh_channels().await {
                warn!("Channel refresh failed: {}", e);
            }
            println!("{}", render::channel_list(&view.snapshot()));
        }
        Command::Join(channel) => join(view, &channel, me).await,
        Command::Older => {
            let update = view.load_older().await;
            match update.load {
                Some(LoadOutcome::Loaded { inserted, has_more, .. }) => {
                    let snapshot = view.snapshot();
                    for message in snapshot.messages.iter().take(inserted) {
                        println!("{}", render::message_line(message, me));
                    }
                    if !has_more {
                        println!("-- start of history --");
                    }
                }
                Some(LoadOutcome::Skipped) => println!("-- nothing more to load --"),
                _ => {}
            }
        }
        Command::Attach(path) => match LocalFile::from_path(&path).await {
            Ok(file) => {
                let name = file.name.clone();
                match draft.attach(file) {
                    Ok(()) => println!("attached {} ({} file(s))", name, draft.files().len()),
                    Err(e) => println!("! {}", e),
                }
            }
            Err(e) => println!("! cannot read {}: {}", path.display(), e),
        },
        Command::Send(text) => {
            if let Some(text) = text {
                draft.content = text;
            }
            return send(view, draft, me).await;
        }
        Command::Help => println!("{HELP}"),
        Command::Unknown(line) => println!("unknown command: {line}\n{HELP}"),
        Command::Quit => {}
    }
    None
}

async fn join(view: &ChatView, channel: &str, me: Option<Uuid>) {
    let Some(found) = view.find_channel(channel) else {
        println!("! no channel named {channel}");
        return;
    };
    let update = view.select_channel(found.id).await;
    // A terminal is always scrolled to the bottom.
    view.viewport_settled();

    println!("== #{} ==", found.name);
    for message in view.snapshot().messages {
        println!("{}", render::message_line(&message, me));
    }
    if update.load.is_none() {
        println!("! could not load messages");
    }
}

async fn send(view: &ChatView, draft: &mut Draft, me: Option<Uuid>) -> Option<PendingSend> {
    let (pending, _) = match view.begin_send(draft).await {
        Ok(begun) => begun,
        Err(e) => {
            println!("! {}", e);
            return None;
        }
    };
    println!("{}", render::message_line(pending.message(), me));
    (!pending.upload_tasks().is_empty()).then_some(pending)
}

async fn on_push(view: &ChatView, event: PushEvent, me: Option<Uuid>) {
    let active = view.active_channel();
    let shown = match &event {
        PushEvent::MessageCreate { message } if Some(message.channel_id) == active => {
            Some(message.clone())
        }
        _ => None,
    };
    let channel_id = event.channel_id();

    let update = view.apply_push(event).await;
    match (shown, update.scroll) {
        (Some(message), ScrollCommand::ToBottom { .. }) => {
            println!("{}", render::message_line(&message, me));
        }
        _ => {
            if let Some(entry) = view
                .snapshot()
                .channels
                .into_iter()
                .find(|entry| Some(entry.channel.id) == channel_id && entry.unread > 0)
            {
                println!("-- #{}: {} unread --", entry.channel.name, entry.unread);
            }
        }
    }
}
