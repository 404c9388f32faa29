use crate::{
    api::FbsApi,
    audit::AuditLog,
    config::Config,
    deactivation::{DeactivationFlow, Evaluation, FlowState},
    error::WorkflowError,
    model::UserId,
    prompt::Confirmer,
    render,
    users::{StatusFilter, UserDirectory},
    Args,
};
use anyhow::{anyhow, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;

pub struct Context {
    pub args: Args,
    pub api: Box<dyn FbsApi>,
    pub confirmer: Confirmer,
    pub audit: RefCell<AuditLog>,
    pub directory: RefCell<UserDirectory>,
    pub flow: RefCell<DeactivationFlow>,
}

impl Context {
    pub fn new(
        args: Args,
        api: Box<dyn FbsApi>,
        config: &Config,
        confirmer: Confirmer,
        audit: AuditLog,
    ) -> Self {
        Self {
            args,
            api,
            confirmer,
            audit: RefCell::new(audit),
            directory: RefCell::new(UserDirectory::new()),
            flow: RefCell::new(DeactivationFlow::new(&config.workflow)),
        }
    }
}

fn verbose(ctx: &Context, message: &str) {
    if ctx.args.verbose || ctx.args.debug {
        eprintln!("[VERBOSE] {}", message);
    }
}

/// Audit and print a failed workflow step
fn report(ctx: &Context, action: &str, user_id: Option<&UserId>, err: &WorkflowError) {
    let mut audit = ctx.audit.borrow_mut();
    if let Some(user_id) = user_id {
        let step = match err {
            WorkflowError::Lookup(failures) => Some(("lookup", failures)),
            WorkflowError::Cascade(failures) => Some(("cancel", failures)),
            _ => None,
        };
        if let Some((step, failures)) = step {
            let _ = audit.category_failures(user_id, step, failures);
            let failed: Vec<&str> = failures.categories().iter().map(|c| c.as_str()).collect();
            verbose(ctx, &format!("{} failed for: {}", step, failed.join(", ")));
        }
    }
    let _ = audit.workflow_error(action, &err.to_string());
    eprintln!("Error: {}", err);
}

fn refresh(ctx: &Context) -> Result<usize> {
    let count = ctx.directory.borrow_mut().refresh(ctx.api.as_ref())?;
    let _ = ctx.audit.borrow_mut().users_loaded(count);
    verbose(ctx, &format!("loaded {} users", count));
    Ok(count)
}

/// Make sure the directory holds `user_id`, fetching the list if it does not
fn ensure_loaded(ctx: &Context, user_id: &UserId) -> Result<()> {
    if ctx.directory.borrow().get(user_id).is_none() {
        refresh(ctx)?;
    }
    Ok(())
}

pub fn list_users(ctx: &Context, filter: StatusFilter, search: &str) -> Result<()> {
    refresh(ctx)?;
    let mut directory = ctx.directory.borrow_mut();
    directory.set_filter(filter);
    directory.set_search(search);
    println!("{}", render::users_table(&directory.visible()));
    Ok(())
}

pub fn activate(ctx: &Context, user_id: &UserId) -> Result<()> {
    ensure_loaded(ctx, user_id)?;
    let result =
        ctx.directory
            .borrow_mut()
            .set_active(ctx.api.as_ref(), user_id, true);
    match result {
        Ok(user) => {
            let _ = ctx.audit.borrow_mut().status_changed(user_id, true);
            println!("{} ({}) is active", user.name, user.user_id);
            Ok(())
        }
        Err(err) => {
            report(ctx, "activate", Some(user_id), &err);
            Err(err.into())
        }
    }
}

/// First step: check bookings, deactivating at once when there are none.
/// Returns true when the user ended up deactivated.
pub fn begin_deactivation(ctx: &Context, user_id: &UserId) -> Result<bool> {
    ensure_loaded(ctx, user_id)?;
    let result = ctx.flow.borrow_mut().evaluate(
        ctx.api.as_ref(),
        &mut ctx.directory.borrow_mut(),
        user_id,
    );

    match result {
        Ok(Evaluation::Deactivated(user)) => {
            let _ = ctx.audit.borrow_mut().status_changed(user_id, false);
            println!(
                "{} ({}) has been deactivated; there were no future bookings.",
                user.name, user.user_id
            );
            Ok(true)
        }
        Ok(Evaluation::PendingConfirm(bookings)) => {
            let _ = ctx
                .audit
                .borrow_mut()
                .deactivation_evaluated(user_id, &bookings);
            println!(
                "User {} has {} future booking(s):\n",
                user_id,
                bookings.total()
            );
            println!("{}\n", render::future_bookings(&bookings, chrono::Utc::now()));
            Ok(false)
        }
        Err(err) => {
            report(ctx, "evaluate", Some(user_id), &err);
            Err(err.into())
        }
    }
}

pub fn cancel_bookings(ctx: &Context, user_id: &UserId) -> Result<()> {
    let result = ctx
        .flow
        .borrow_mut()
        .cancel_future_bookings(ctx.api.as_ref(), user_id);

    match result {
        Ok(outcome) => {
            let _ = ctx
                .audit
                .borrow_mut()
                .future_bookings_cancelled(user_id, &outcome);
            verbose(
                ctx,
                &format!("{} categories had bookings to cancel", outcome.deleted().len()),
            );
            println!("Future bookings of user {}:", user_id);
            println!("{}", render::cascade_report(&outcome));
            Ok(())
        }
        Err(err) => {
            report(ctx, "cancel", Some(user_id), &err);
            Err(err.into())
        }
    }
}

pub fn finish_deactivation(ctx: &Context, user_id: &UserId) -> Result<()> {
    let result = ctx.flow.borrow_mut().confirm(
        ctx.api.as_ref(),
        &mut ctx.directory.borrow_mut(),
        user_id,
    );

    match result {
        Ok(user) => {
            let _ = ctx.audit.borrow_mut().status_changed(user_id, false);
            println!("{} ({}) has been deactivated.", user.name, user.user_id);
            Ok(())
        }
        Err(err) => {
            report(ctx, "deactivate", Some(user_id), &err);
            Err(err.into())
        }
    }
}

pub fn dismiss(ctx: &Context) {
    let left = ctx.flow.borrow_mut().dismiss();
    if left != FlowState::Idle {
        let _ = ctx.audit.borrow_mut().workflow_dismissed(&left.describe());
        println!("Dismissed: {}", left.describe());
    }
}

/// One-shot deactivation with both confirmations asked in sequence
pub fn deactivate(ctx: &Context, user_id: &UserId) -> Result<()> {
    if begin_deactivation(ctx, user_id)? {
        return Ok(());
    }

    if !ctx.confirmer.confirm("Delete all future bookings of this user?") {
        dismiss(ctx);
        return Err(anyhow!("deactivation of user {} abandoned", user_id));
    }
    cancel_bookings(ctx, user_id)?;

    if !ctx.confirmer.confirm(&format!("Deactivate user {} now?", user_id)) {
        dismiss(ctx);
        return Err(anyhow!(
            "bookings of user {} were cancelled but the user is still active",
            user_id
        ));
    }
    finish_deactivation(ctx, user_id)
}

fn pending_user(ctx: &Context) -> Option<UserId> {
    match ctx.flow.borrow().state() {
        FlowState::PendingConfirm { user_id, .. } | FlowState::AwaitingFinalConfirm { user_id } => {
            Some(user_id.clone())
        }
        _ => None,
    }
}

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = dirs::home_dir().map(|home| home.join(".fbs").join("history.txt"));
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    println!("fbs-admin - type /help for commands, /exit to quit");
    if let Err(e) = refresh(&ctx) {
        eprintln!("Error: could not load users: {}", e);
    }

    loop {
        match rl.readline("fbs> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if handle_command(&ctx, line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let _ = rl.save_history(path);
    }
    Ok(())
}

/// Handle one REPL line; returns true when the session should end
pub fn handle_command(ctx: &Context, line: &str) -> bool {
    let parts: Vec<&str> = line.splitn(2, ' ').collect();
    let rest = parts.get(1).copied().unwrap_or("").trim();
    let words = match shell_words::split(rest) {
        Ok(words) => words,
        Err(e) => {
            println!("Could not parse arguments: {}", e);
            return false;
        }
    };

    // failures are already reported where they happen
    let result = match parts[0] {
        "/exit" | "/quit" => return true,
        "/help" => {
            print_help();
            Ok(())
        }
        "/users" => show_users(ctx, &words),
        "/refresh" => refresh(ctx).map(|count| println!("Loaded {} users", count)),
        "/deactivate" => match words.first() {
            Some(id) => begin_deactivation(ctx, &UserId::new(id.as_str())).map(|done| {
                if !done {
                    println!("Use /cancel-bookings to cancel them, or /dismiss to stop.");
                }
            }),
            None => {
                println!("Usage: /deactivate <user-id>");
                Ok(())
            }
        },
        "/cancel-bookings" => match pending_user(ctx) {
            Some(user_id) => cancel_bookings(ctx, &user_id)
                .map(|_| println!("Use /confirm to deactivate, or /dismiss to stop.")),
            None => {
                println!("No deactivation in progress. Start one with /deactivate <user-id>.");
                Ok(())
            }
        },
        "/confirm" => match pending_user(ctx) {
            Some(user_id) => finish_deactivation(ctx, &user_id),
            None => {
                println!("No deactivation in progress.");
                Ok(())
            }
        },
        "/dismiss" => {
            dismiss(ctx);
            Ok(())
        }
        "/activate" => match words.first() {
            Some(id) => activate(ctx, &UserId::new(id.as_str())),
            None => {
                println!("Usage: /activate <user-id>");
                Ok(())
            }
        },
        "/state" => {
            let flow = ctx.flow.borrow();
            println!("Workflow: {}", flow.state().describe());
            println!("Cascade policy: {}", flow.policy().as_str());
            let directory = ctx.directory.borrow();
            println!(
                "Users loaded: {} (filter: {}, search: {:?})",
                directory.users().len(),
                directory.filter().label(),
                directory.search()
            );
            let audit = ctx.audit.borrow();
            println!("Session: {}", audit.session_id());
            if let Some(path) = &audit.path {
                println!("Audit log: {}", path.display());
            }
            Ok(())
        }
        other => {
            println!("Unknown command: {}. Type /help for commands.", other);
            Ok(())
        }
    };

    if let Err(e) = result {
        verbose(ctx, &format!("{} failed: {}", parts[0], e));
    }
    false
}

/// `/users [status] [search...]`; with no arguments the held filter is reused
fn show_users(ctx: &Context, words: &[String]) -> Result<()> {
    if ctx.directory.borrow().users().is_empty() {
        refresh(ctx)?;
    }

    let mut directory = ctx.directory.borrow_mut();
    let mut search_words = words;
    if let Some(first) = words.first() {
        if let Some(filter) = StatusFilter::from_str(first) {
            directory.set_filter(filter);
            search_words = &words[1..];
        }
    }
    if !words.is_empty() {
        directory.set_search(search_words.join(" "));
    }

    println!("{}", render::users_table(&directory.visible()));
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  /exit                      - quit");
    println!("  /help                      - show commands");
    println!("  /users [status] [search]   - list users (status: all|active|deactive)");
    println!("  /refresh                   - reload users from the backend");
    println!("  /state                     - show workflow and filter state");
    println!("Lifecycle:");
    println!("  /activate <id>             - activate a user");
    println!("  /deactivate <id>           - deactivate, or list future bookings that block it");
    println!("  /cancel-bookings           - cancel the listed future bookings");
    println!("  /confirm                   - deactivate after bookings were cancelled");
    println!("  /dismiss                   - abandon the current deactivation");
}
