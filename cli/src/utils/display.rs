use agentverse_chain::RunInfo;
use agentverse_sync::{Message, Role, RunSession};
use chrono::Local;
use colored::Colorize;

pub fn print_message(message: &Message) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let speaker = match message.role {
        Role::User => "you".blue().bold(),
        Role::Assistant => "agent".green().bold(),
        ref other => other.as_str().dimmed(),
    };
    println!("{} {} {}", time.dimmed(), speaker, message.content);
}

pub fn print_messages(messages: &[Message]) {
    for message in messages {
        print_message(message);
    }
}

pub fn print_session_summary(session: &RunSession) {
    println!(
        "Run {}: {} messages, {} on-chain entries read ({:?})",
        session.run_id().to_string().cyan(),
        session.messages().len(),
        session.cursor(),
        session.phase()
    );
}

pub fn print_run_info(run_id: &str, info: &RunInfo) {
    println!("{}", format!("Run {}", run_id).bold());
    println!("  Owner:          {}", info.owner.to_string().cyan());
    println!("  Responses:      {}", info.responses_count);
    println!("  Max iterations: {}", info.max_iterations);
    let finished = if info.is_finished {
        "yes".green()
    } else {
        "no".yellow()
    };
    println!("  Finished:       {}", finished);
    if !info.knowledge_base.is_empty() {
        println!("  Knowledge base: {}", info.knowledge_base);
    }
}
