use anyhow::Result;
use bat::PrettyPrinter;
use cliclack::{input, spinner};
use console::style;
use futures::StreamExt;

use emissary::agent::Agent;
use emissary::models::message::{Message, MessageContent};
use emissary::models::role::Role;

/// Interactive persona chat session. The conversation history accumulates
/// across turns; each turn's generated messages are appended so the next
/// turn sees the full exchange.
pub async fn run(agent: Agent) -> Result<()> {
    println!(
        "Emissary chat {}",
        style("- type \"exit\" to end the session").dim()
    );
    println!();

    let mut messages: Vec<Message> = Vec::new();

    loop {
        let message_text: String = input("Message:").placeholder("").multiline().interact()?;

        if message_text.trim().eq_ignore_ascii_case("exit") {
            break;
        }
        messages.push(Message::user().with_text(&message_text));

        let spin = spinner();
        spin.start("awaiting reply");

        let mut stream = match agent.reply(&messages).await {
            Ok(stream) => stream,
            Err(e) => {
                spin.stop("");
                eprintln!("Error starting reply: {}", e);
                reset_last_turn(&mut messages);
                continue;
            }
        };

        let mut turn: Vec<Message> = Vec::new();
        let mut failed = false;
        while let Some(result) = stream.next().await {
            match result {
                Ok(message) => turn.push(message),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    failed = true;
                    break;
                }
            }
        }
        drop(stream);
        spin.stop("");

        if failed {
            // Reset the interaction to before the failed user request so the
            // history never ends on an unanswered tool request
            reset_last_turn(&mut messages);
            continue;
        }

        for message in turn {
            render(&message).await;
            messages.push(message);
        }
        println!();
    }
    Ok(())
}

/// Pop all messages from the assistant and the most recent user message
fn reset_last_turn(messages: &mut Vec<Message>) {
    while let Some(message) = messages.pop() {
        if message.role == Role::User {
            break;
        }
    }
}

async fn render(message: &Message) {
    for content in &message.content {
        match content {
            MessageContent::Text(text) => {
                if !text.is_empty() {
                    render_markdown(text).await;
                }
            }
            MessageContent::ToolRequest(request) => match &request.tool_call {
                Ok(call) => {
                    println!("{}", style(format!("Tool called: {}", call.name)).dim());
                }
                Err(e) => {
                    println!("{}", style(format!("Tool request failed: {}", e)).dim());
                }
            },
            MessageContent::ToolResponse(_) => {}
        }
    }
}

pub async fn render_markdown(content: &str) {
    PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print()
        .unwrap();
}
