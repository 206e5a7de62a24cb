use std::sync::Arc;

use anyhow::Result;
use chat_api::ChatService;
use chat_widget::{
    config,
    memory::{MemoryChatService, Transcript},
    reads::{MessageView, ReadIcon},
    ChatWidget, RowViewport, Viewport,
};
use clap::Parser;
use tracing::info;

const ROW_HEIGHT: f64 = 24.0;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = config::Cli::parse();
    let cfg = config::Config::load(&cli)?;
    let level = if cfg.logging_enabled {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let transcript = Transcript::load(&cli.transcript)?;
    let group_id = transcript.group_id.clone();
    let service = Arc::new(MemoryChatService::from_transcript(transcript));
    let viewport = Arc::new(RowViewport::new(service.clone(), ROW_HEIGHT));
    viewport.show_group(&group_id);
    let widget = ChatWidget::new(service.clone(), viewport.clone(), &cli.viewer, cfg.page_size);
    widget.open_group(&group_id).await?;

    for _ in 0..cli.scrolls {
        viewport.set_scroll_top(0.0);
        let outcome = widget.on_scroll().await;
        info!(?outcome, page = widget.pagination().page(), "scrolled to top");
    }

    let messages = service.messages(&group_id);
    for (view, message) in widget.render().iter().zip(&messages) {
        let text = message.display_content(None).unwrap_or("[attachment]");
        println!("{}", render_line(view, text));
    }
    println!("unread: {}", widget.unread());
    println!("online: {}", service.online_users().join(", "));
    Ok(())
}

fn render_line(view: &MessageView, text: &str) -> String {
    let icon = match view.icon {
        ReadIcon::SentUnread => " ✓✓ (sent, not read yet)",
        ReadIcon::None => "",
    };
    let seen = if view.seen_by.is_empty() {
        String::new()
    } else {
        let names: Vec<String> = view
            .seen_by
            .iter()
            .map(|s| {
                if s.online {
                    format!("{}*", s.display_name)
                } else {
                    s.display_name.clone()
                }
            })
            .collect();
        format!("  seen by {}", names.join(", "))
    };
    format!("{:>4} {:<12} {}{}{}", view.index, view.sender_id, text, icon, seen)
}
