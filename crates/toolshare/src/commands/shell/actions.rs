use toolshare_tools::{MonthView, ProgressNode, Toolbox, ToolError, YearMonth};

use super::parse::ToolAction;

/// Run `action` against one instance's tools and describe the outcome.
pub async fn perform(tools: &Toolbox, action: ToolAction) -> Result<String, ToolError> {
    let output = match action {
        ToolAction::MemoShow => {
            let text = tools.memo.text();
            if text.is_empty() {
                "(empty memo)".to_string()
            } else {
                text
            }
        }
        ToolAction::MemoSave(text) => {
            tools.memo.save(text).await?;
            "Memo saved.".to_string()
        }
        ToolAction::MemoClear => {
            tools.memo.clear().await?;
            "Memo cleared.".to_string()
        }
        ToolAction::TimerShow => {
            let view = tools.timer.view();
            if view.running {
                format!("{}s remaining", view.remaining)
            } else {
                "Timer idle".to_string()
            }
        }
        ToolAction::TimerStart(seconds) => {
            tools.timer.start(seconds).await?;
            format!("Timer started: {seconds}s")
        }
        ToolAction::TimerStop => {
            tools.timer.stop().await;
            "Timer stopped.".to_string()
        }
        ToolAction::CalendarShow => {
            let events = tools.calendar.events();
            if events.is_empty() {
                "(no events)".to_string()
            } else {
                events
                    .iter()
                    .filter_map(|(date, entries)| {
                        entries.first().map(|content| format!("{date}  {content}"))
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        ToolAction::CalendarSave { date, content } => {
            tools.calendar.save(&date, &content).await?;
            format!("Saved event on {date}.")
        }
        ToolAction::CalendarDelete(date) => {
            if tools.calendar.delete(&date).await? {
                format!("Deleted event on {date}.")
            } else {
                format!("No event on {date}.")
            }
        }
        ToolAction::CalendarMonth(None) => render_month(&tools.calendar.month_view()),
        ToolAction::CalendarMonth(Some(month)) => {
            render_month(&tools.calendar.show_month(YearMonth::parse(&month)?))
        }
        ToolAction::CalendarNext => render_month(&tools.calendar.next_month()),
        ToolAction::CalendarPrev => render_month(&tools.calendar.prev_month()),
        ToolAction::MapShow => render_tree(&tools.map.tree()),
        ToolAction::MapAdd { parent, name } => {
            let id = tools.map.add_child(&parent, &name).await?;
            format!("Added {id}")
        }
        ToolAction::MapDone { id, done } => {
            tools.map.set_done(&id, done).await?;
            format!("Marked {id} {}.", if done { "done" } else { "not done" })
        }
        ToolAction::MapRemove(id) => {
            tools.map.remove(&id).await?;
            format!("Removed {id}.")
        }
        ToolAction::QrShow => tools
            .qr
            .last_text()
            .unwrap_or_else(|| "(nothing shared yet)".to_string()),
        ToolAction::QrGenerate(text) => {
            tools.qr.generate(&text).await?;
            "QR code generated.".to_string()
        }
        ToolAction::RewriteShow => tools
            .rewrite
            .last_result()
            .unwrap_or_else(|| "(nothing rewritten yet)".to_string()),
        ToolAction::Rewrite { style, text } => tools.rewrite.rewrite(&text, style).await?,
    };
    Ok(output)
}

/// Sunday-first grid; `*` marks days with an event, listed underneath.
fn render_month(view: &MonthView) -> String {
    let mut lines = vec![view.month.to_string(), " Su  Mo  Tu  We  Th  Fr  Sa".to_string()];
    let mut week = "    ".repeat(view.leading_blanks as usize);
    let mut filled = view.leading_blanks;
    for cell in &view.days {
        let mark = if cell.event.is_some() { '*' } else { ' ' };
        week.push_str(&format!("{:>3}{mark}", cell.day));
        filled += 1;
        if filled % 7 == 0 {
            lines.push(week.trim_end().to_string());
            week.clear();
        }
    }
    if !week.is_empty() {
        lines.push(week.trim_end().to_string());
    }
    for cell in &view.days {
        if let Some(event) = &cell.event {
            lines.push(format!("{}  {event}", cell.date));
        }
    }
    lines.join("\n")
}

fn render_tree(tree: &ProgressNode) -> String {
    tree.walk()
        .into_iter()
        .map(|(depth, node)| {
            format!(
                "{}[{}] {}  ({})",
                "  ".repeat(depth),
                if node.done { "x" } else { " " },
                node.name,
                node.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
