use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::task::{Priority, Task};
use crate::view::{CategoryGroup, Positioned, Stats};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    #[tracing::instrument(skip(self, entries, today))]
    pub fn print_task_table(&mut self, entries: &[Positioned<'_>], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if entries.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }
        self.write_task_table(&mut out, entries, today)
    }

    #[tracing::instrument(skip(self, done))]
    pub fn print_done_table(&mut self, done: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if done.is_empty() {
            writeln!(out, "No completed tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "Description".to_string(),
            "Category".to_string(),
            "Recur".to_string(),
        ];
        let rows = done
            .iter()
            .map(|task| {
                vec![
                    self.paint(&task.description, "2"),
                    task.category_name().to_string(),
                    task.recurring.to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip(self, groups, today))]
    pub fn print_category_groups(&mut self, groups: &[CategoryGroup<'_>], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if groups.is_empty() {
            writeln!(out, "No categories.")?;
            return Ok(());
        }

        for (idx, group) in groups.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            let heading = format!("{}. {} ({})", idx + 1, group.name, group.tasks.len());
            writeln!(out, "{}", self.paint(&heading, "1"))?;
            self.write_task_table(&mut out, &group.tasks, today)?;
        }
        Ok(())
    }

    pub fn print_stats(&mut self, stats: &Stats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write_stats(&mut out, stats)
    }

    fn write_task_table<W: Write>(
        &self,
        writer: W,
        entries: &[Positioned<'_>],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "#".to_string(),
            "Description".to_string(),
            "Category".to_string(),
            "Priority".to_string(),
            "Recur".to_string(),
            "Due".to_string(),
        ];

        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            let task = entry.task;
            let position = self.paint(&entry.position.to_string(), "33");

            let priority = match task.priority.normalized() {
                Priority::Urgent => self.paint(task.priority.label(), "31;1"),
                Priority::Today => self.paint(task.priority.label(), "33"),
                _ => task.priority.label().to_string(),
            };

            let due = task.due.clone().unwrap_or_default();
            let due = if task.is_overdue(today) {
                self.paint(&due, "31")
            } else {
                due
            };

            rows.push(vec![
                position,
                task.description.clone(),
                task.category_name().to_string(),
                priority,
                task.recurring.to_string(),
                due,
            ]);
        }

        write_table(writer, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_stats<W: Write>(mut writer: W, stats: &Stats) -> anyhow::Result<()> {
    for (label, count) in [
        ("Active", stats.active),
        ("Urgent", stats.urgent),
        ("Today", stats.today),
        ("Overdue", stats.overdue),
        ("Done", stats.completed),
    ] {
        writeln!(writer, "{label:<8} {count}")?;
    }
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = (0..column_count)
        .map(|idx| format!("{:width$}", headers[idx], width = widths[idx]))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" "))?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate() {
            if idx > 0 {
                line.push(' ');
            }
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            line.push_str(cell);
            line.push_str(&" ".repeat(widths[idx].saturating_sub(visible_width)));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Renderer, strip_ansi, write_stats, write_table};
    use crate::task::{Priority, Task};
    use crate::view::{Stats, TaskFilter, filter_tasks};

    #[test]
    fn columns_align_on_display_width() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["#".to_string(), "Description".to_string()],
            vec![
                vec!["1".to_string(), "お茶を買う".to_string()],
                vec!["12".to_string(), "\x1b[31mtea\x1b[0m".to_string()],
            ],
        )
        .expect("write table");

        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#  Description");
        assert_eq!(lines[1], "-- -----------");
        assert_eq!(lines[2], "1  お茶を買う");
        assert_eq!(strip_ansi(lines[3]), "12 tea");
    }

    #[test]
    fn task_rows_show_canonical_positions() {
        let renderer = Renderer { color: false };
        let tasks = vec![
            Task::new("milk").with_category("home"),
            Task::new("report")
                .with_category("work")
                .with_priority(Priority::Urgent)
                .with_due("2026-01-01"),
        ];
        let entries = filter_tasks(&tasks, &TaskFilter::Category("work".to_string()));
        let today = NaiveDate::from_ymd_opt(2026, 2, 1).expect("date");

        let mut out = Vec::new();
        renderer
            .write_task_table(&mut out, &entries, today)
            .expect("write tasks");

        let text = String::from_utf8(out).expect("utf8");
        let row = text.lines().nth(2).expect("row");
        assert!(row.starts_with("2 report"));
        assert!(row.contains("work"));
        assert!(row.contains("2026-01-01"));
    }

    #[test]
    fn stats_are_listed_one_per_line() {
        let mut out = Vec::new();
        write_stats(
            &mut out,
            &Stats {
                active: 4,
                urgent: 1,
                today: 2,
                overdue: 0,
                completed: 9,
            },
        )
        .expect("write stats");

        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text.lines().next(), Some("Active   4"));
        assert_eq!(text.lines().last(), Some("Done     9"));
    }
}
