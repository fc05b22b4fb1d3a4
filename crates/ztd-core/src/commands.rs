use anyhow::{Context, anyhow, bail};
use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::api::TaskApi;
use crate::category_order::CategoryOrderStore;
use crate::cli::Invocation;
use crate::config::Config;
use crate::controller::{Controller, MutationError};
use crate::input::QuickEntry;
use crate::render::Renderer;
use crate::task::{Priority, Recurrence};
use crate::view::{ComposedView, TaskFilter, ViewMode, stats};
use crate::wire::{CreateTask, NewTask, TaskPatch};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "list",
        "completed",
        "categories",
        "add",
        "edit",
        "delete",
        "done",
        "move",
        "catmove",
        "catadd",
        "stats",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(controller, cfg, renderer, inv))]
pub fn dispatch<A: TaskApi, S: CategoryOrderStore>(
    controller: &mut Controller<A, S>,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    let args = &inv.command_args;

    debug!(
        command,
        filter = %inv.filter,
        args = ?args,
        "dispatching command"
    );

    match command {
        "list" => cmd_view(controller, renderer, &inv.filter, ViewMode::Active),
        "completed" => cmd_view(controller, renderer, &inv.filter, ViewMode::Done),
        "categories" => cmd_view(controller, renderer, &inv.filter, ViewMode::Categories),
        "add" => cmd_add(controller, args),
        "edit" => cmd_edit(controller, args),
        "delete" => cmd_delete(controller, args),
        "done" => cmd_done(controller, args),
        "move" => cmd_move(controller, renderer, &inv.filter, args),
        "catmove" => cmd_catmove(controller, renderer, args),
        "catadd" => cmd_catadd(controller, args),
        "stats" => cmd_stats(controller, renderer),
        "help" => cmd_help(cfg),
        "version" => {
            println!("ztd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn cmd_view<A: TaskApi, S: CategoryOrderStore>(
    controller: &Controller<A, S>,
    renderer: &mut Renderer,
    filter: &TaskFilter,
    mode: ViewMode,
) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    match controller.view(filter, mode) {
        ComposedView::Active(entries) => renderer.print_task_table(&entries, today),
        ComposedView::Done(done) => renderer.print_done_table(done),
        ComposedView::Categories(groups) => renderer.print_category_groups(&groups, today),
    }
}

#[instrument(skip(controller, args))]
fn cmd_add<A: TaskApi, S: CategoryOrderStore>(
    controller: &mut Controller<A, S>,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command add");

    let (text, mods) = split_text_and_mods(args)?;
    let task = if mods.is_empty() {
        // Raw text goes to the service as-is, markers and all.
        if text.trim().is_empty() {
            return Err(MutationError::EmptyInput.into());
        }
        let result = controller.add(&CreateTask::input(text));
        settle(controller, result)?
    } else {
        let mut new_task = NewTask {
            description: text,
            ..NewTask::default()
        };
        for one_mod in mods {
            match one_mod {
                Mod::Description(description) => new_task.description = description,
                Mod::Category(category) => new_task.category = category,
                Mod::Priority(priority) => new_task.priority = priority,
                Mod::Recurring(recurring) => new_task.recurring = recurring,
                Mod::Due(due) => new_task.due = due,
            }
        }
        if new_task.description.trim().is_empty() {
            return Err(MutationError::EmptyInput.into());
        }
        let result = controller.add(&CreateTask::Structured(new_task));
        settle(controller, result)?
    };

    println!("Created task '{}'.", task.description);
    Ok(())
}

#[instrument(skip(controller, args))]
fn cmd_catadd<A: TaskApi, S: CategoryOrderStore>(
    controller: &mut Controller<A, S>,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command catadd");

    let (category, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("catadd: usage is catadd <category> <text> [modifiers]"))?;
    let (text, mods) = split_text_and_mods(rest)?;

    let mut entry = QuickEntry::new(text);
    entry.category = Some(category.clone());
    for one_mod in mods {
        match one_mod {
            Mod::Description(description) => entry.text = description,
            Mod::Category(category) => entry.category = Some(category),
            Mod::Priority(priority) => entry.priority = priority,
            Mod::Recurring(recurring) => entry.recurring = recurring,
            Mod::Due(due) => entry.due = Some(due),
        }
    }

    let result = controller.add_quick(&entry);
    let task = settle(controller, result)?;
    println!("Created task '{}' in {}.", task.description, task.category_name());
    Ok(())
}

#[instrument(skip(controller, args))]
fn cmd_edit<A: TaskApi, S: CategoryOrderStore>(
    controller: &mut Controller<A, S>,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command edit");

    let (position, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("edit: usage is edit <position> <modifiers>"))?;
    let position = parse_position(position)?;

    let mut patch = TaskPatch::default();
    let (text, mods) = split_text_and_mods(rest)?;
    if !text.is_empty() {
        patch.description = Some(text);
    }
    for one_mod in mods {
        match one_mod {
            Mod::Description(description) => patch.description = Some(description),
            Mod::Category(category) => patch.category = Some(category),
            Mod::Priority(priority) => patch.priority = Some(priority),
            Mod::Recurring(recurring) => patch.recurring = Some(recurring),
            Mod::Due(due) => patch.due = Some(due),
        }
    }

    if patch.is_empty() {
        warn!(position, "edit without modifications");
        println!("Nothing to change.");
        return Ok(());
    }

    let result = controller.update(position, &patch);
    settle(controller, result)?;
    println!("Modified task {position}.");
    Ok(())
}

#[instrument(skip(controller, args))]
fn cmd_delete<A: TaskApi, S: CategoryOrderStore>(
    controller: &mut Controller<A, S>,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command delete");

    let position = single_position("delete", args)?;
    let description = described(controller, position);
    let result = controller.delete(position);
    settle(controller, result)?;
    println!("Deleted task {position}{description}.");
    Ok(())
}

#[instrument(skip(controller, args))]
fn cmd_done<A: TaskApi, S: CategoryOrderStore>(
    controller: &mut Controller<A, S>,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command done");

    let position = single_position("done", args)?;
    let description = described(controller, position);
    let result = controller.mark_done(position);
    settle(controller, result)?;
    println!("Completed task {position}{description}.");
    Ok(())
}

#[instrument(skip(controller, renderer, filter, args))]
fn cmd_move<A: TaskApi, S: CategoryOrderStore>(
    controller: &mut Controller<A, S>,
    renderer: &mut Renderer,
    filter: &TaskFilter,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command move");

    let (from, to) = two_positions("move", args)?;
    let result = controller.move_in_view(filter, from, to);
    if !settle(controller, result)? {
        println!("Order unchanged.");
        return Ok(());
    }

    cmd_view(controller, renderer, filter, ViewMode::Active)
}

#[instrument(skip(controller, renderer, args))]
fn cmd_catmove<A: TaskApi, S: CategoryOrderStore>(
    controller: &mut Controller<A, S>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command catmove");

    let (from, to) = two_positions("catmove", args)?;
    let result = controller.move_category(from, to);
    let order = settle(controller, result)?;
    debug!(?order, "stored category order");

    cmd_view(controller, renderer, &TaskFilter::All, ViewMode::Categories)
}

fn cmd_stats<A: TaskApi, S: CategoryOrderStore>(
    controller: &Controller<A, S>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    let state = controller.state();
    let summary = stats(state.tasks(), state.done(), Local::now().date_naive());
    renderer.print_stats(&summary)
}

fn cmd_help(cfg: &Config) -> anyhow::Result<()> {
    let default_command = cfg
        .get("default.command")
        .unwrap_or_else(|| "list".to_string());
    println!("usage: ztd [flags] [filter] <command> [args]");
    println!();
    println!("filters:  cat:<name> | prio:<urgent|today|tomorrow|later>");
    println!("commands: {}", known_command_names().join(", "));
    println!("modifiers for add/edit/catadd: desc: cat: prio: recur: due:");
    println!("default command: {default_command}");
    Ok(())
}

/// Turns a controller failure into the message the user sees: the recorded notice when the
/// service was involved, the plain error otherwise.
fn settle<A: TaskApi, S: CategoryOrderStore, T>(
    controller: &mut Controller<A, S>,
    result: Result<T, MutationError>,
) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(MutationError::Api(err)) => match controller.take_notice() {
            Some(notice) => bail!(notice),
            None => Err(err.into()),
        },
        Err(err) => Err(err.into()),
    }
}

fn described<A: TaskApi, S: CategoryOrderStore>(controller: &Controller<A, S>, position: usize) -> String {
    position
        .checked_sub(1)
        .and_then(|idx| controller.state().tasks().get(idx))
        .map(|task| format!(" '{}'", task.description))
        .unwrap_or_default()
}

fn parse_position(raw: &str) -> anyhow::Result<usize> {
    let position = raw
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid position '{raw}'"))?;
    if position == 0 {
        bail!("positions start at 1");
    }
    Ok(position)
}

fn single_position(command: &str, args: &[String]) -> anyhow::Result<usize> {
    match args {
        [position] => parse_position(position),
        _ => Err(anyhow!("{command}: usage is {command} <position>")),
    }
}

fn two_positions(command: &str, args: &[String]) -> anyhow::Result<(usize, usize)> {
    match args {
        [from, to] => Ok((parse_position(from)?, parse_position(to)?)),
        _ => Err(anyhow!("{command}: usage is {command} <from> <to>")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Mod {
    Description(String),
    Category(String),
    Priority(Priority),
    Recurring(Recurrence),
    Due(String),
}

/// Splits arguments into free text and `key:value` modifiers. Everything after `--` is text.
fn split_text_and_mods(args: &[String]) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut text_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg)? {
            mods.push(one_mod);
            continue;
        }

        text_parts.push(arg.as_str());
    }

    Ok((text_parts.join(" "), mods))
}

fn parse_one_mod(tok: &str) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };
    let value = value.trim();

    let one_mod = match key {
        "desc" | "description" => Mod::Description(value.to_string()),
        "cat" | "category" => Mod::Category(value.to_string()),
        "prio" | "priority" => Mod::Priority(value.parse()?),
        "recur" | "recurring" => Mod::Recurring(value.parse()?),
        "due" => {
            if !value.is_empty() && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                debug!(due = value, "due is not an ISO date; the service will interpret it");
            }
            Mod::Due(value.to_string())
        }
        _ => return Ok(None),
    };
    Ok(Some(one_mod))
}
