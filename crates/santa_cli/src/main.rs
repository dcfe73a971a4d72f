//! Operator CLI entry point.
//!
//! # Responsibility
//! - Wire SQLite storage and the Evolution gateway into `santa_core`.
//! - Print command results as JSON for scripting.

mod config;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use config::{CliArgs, CliConfig, Command};
use log::{info, warn};
use rusqlite::Connection;
use santa_core::db::open_db;
use santa_core::{
    DrawRepository, DrawService, DrawState, EvolutionGateway, Group, MessageGateway, NewGroup,
    NewParticipant, SqliteDrawRepository,
};
use serde_json::json;
use std::path::Path;
use uuid::Uuid;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    if let Some(dir) = &config.log_dir {
        let dir = dir
            .to_str()
            .ok_or_else(|| anyhow!("log directory must be valid UTF-8"))?;
        santa_core::init_logging(&config.log_level, dir).map_err(anyhow::Error::msg)?;
    }

    run(config)
}

fn run(config: CliConfig) -> anyhow::Result<()> {
    match config.command.clone() {
        Command::Ping => {
            println!("santa_core ping={}", santa_core::ping());
            println!("santa_core version={}", santa_core::core_version());
        }
        Command::Probe => {
            let gateway = EvolutionGateway::new(config.santa.gateway.clone())?;
            let available = gateway.probe_availability();
            print_json(&json!({
                "gateway": config.santa.gateway.base_url,
                "instance": config.santa.gateway.instance,
                "available": available,
            }))?;
            if !available {
                bail!("messaging gateway is unavailable");
            }
        }
        Command::CreateGroup {
            db,
            name,
            organizer,
            organizer_contact,
            suggested_value,
            event_date,
        } => {
            let conn = open(&db)?;
            let repo = SqliteDrawRepository::try_new(&conn)?;
            let group = repo.create_group(&NewGroup {
                name,
                organizer_name: organizer,
                organizer_contact,
                suggested_value,
                event_date,
            })?;
            print_json(&group)?;
        }
        Command::AddParticipant {
            db,
            group,
            name,
            contact,
        } => {
            let conn = open(&db)?;
            let repo = SqliteDrawRepository::try_new(&conn)?;
            let group = resolve_group(&repo, &group)?;
            let created = repo.add_participants(
                group.id,
                &[NewParticipant::new(name, contact.as_deref())],
            )?;
            print_json(&created)?;
        }
        Command::Draw { db, group, seed } => {
            let conn = open(&db)?;
            let repo = SqliteDrawRepository::try_new(&conn)?;
            let group = resolve_group(&repo, &group)?;
            let gateway = EvolutionGateway::new(config.santa.gateway.clone())?;

            let mut service = DrawService::from_config(repo, gateway, &config.santa);
            if let Some(seed) = seed {
                service = service.with_seed(seed);
            }
            info!(
                "event=cli_command module=cli command=draw group_id={}",
                group.id
            );
            let outcome = service.execute_draw(group.id)?;
            print_json(&outcome)?;
        }
        Command::Resend {
            db,
            group,
            participant,
        } => {
            let conn = open(&db)?;
            let repo = SqliteDrawRepository::try_new(&conn)?;
            let gateway = EvolutionGateway::new(config.santa.gateway.clone())?;
            let service = DrawService::from_config(repo, gateway, &config.santa);
            info!("event=cli_command module=cli command=resend");

            match (participant, group) {
                (Some(participant_id), _) => {
                    service.resend_participant_notification(participant_id)?;
                    print_json(&json!({
                        "participant_id": participant_id,
                        "sent": true,
                    }))?;
                }
                (None, Some(group_code)) => {
                    let summary = service.resend_group_notifications(&group_code)?;
                    print_json(&summary)?;
                }
                (None, None) => bail!("either --group or --participant is required"),
            }
        }
        Command::NotifyGiver { db, participant } => {
            let conn = open(&db)?;
            let repo = SqliteDrawRepository::try_new(&conn)?;
            let gateway = EvolutionGateway::new(config.santa.gateway.clone())?;
            let service = DrawService::from_config(repo, gateway, &config.santa);
            info!("event=cli_command module=cli command=notify_giver");

            service.notify_giver(participant)?;
            print_json(&json!({
                "receiver_id": participant,
                "sent": true,
            }))?;
        }
        Command::MarkViewed { db, participant } => {
            let conn = open(&db)?;
            let repo = SqliteDrawRepository::try_new(&conn)?;
            repo.mark_viewed(participant)?;
            print_json(&json!({
                "participant_id": participant,
                "has_viewed_result": true,
            }))?;
        }
        Command::Status { db, group } => {
            let conn = open(&db)?;
            let repo = SqliteDrawRepository::try_new(&conn)?;
            let group = resolve_group(&repo, &group)?;
            let gateway = EvolutionGateway::new(config.santa.gateway.clone())?;
            let service = DrawService::from_config(repo, gateway, &config.santa);

            let status = service.group_status(&group.code)?;
            print_json(&status)?;
        }
        Command::Release { db, group } => {
            let conn = open(&db)?;
            let repo = SqliteDrawRepository::try_new(&conn)?;
            let group = resolve_group(&repo, &group)?;
            repo.release_draw(group.id)?;
            warn!(
                "event=draw_release module=cli status=ok group_id={}",
                group.id
            );
            print_json(&json!({
                "group_id": group.id,
                "draw_state": DrawState::Pending,
            }))?;
        }
    }
    Ok(())
}

fn open(path: &Path) -> anyhow::Result<Connection> {
    open_db(path).with_context(|| format!("failed to open database `{}`", path.display()))
}

/// Accepts a group UUID or a group code.
fn resolve_group(repo: &SqliteDrawRepository<'_>, reference: &str) -> anyhow::Result<Group> {
    let found = match Uuid::parse_str(reference.trim()) {
        Ok(group_id) => repo.get_group(group_id)?,
        Err(_) => repo.find_group_by_code(reference)?,
    };
    found.ok_or_else(|| anyhow!("group `{reference}` not found"))
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
