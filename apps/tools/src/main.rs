use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::domain::UserId;
use storage::{LocationStore, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/points.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        username: String,
    },
    ListUsers,
    ListLocations {
        user_id: i64,
        #[arg(long, default_value_t = 100)]
        limit: u32,
        /// Print one JSON object per line.
        #[arg(long)]
        json: bool,
    },
    ClearLocations {
        user_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser { username } => {
            let username = username.trim();
            if username.is_empty() {
                bail!("username must not be empty");
            }
            let user_id = storage.create_user(username).await?;
            println!("user_id={}", user_id.0);
        }
        Command::ListUsers => {
            for user in storage.list_users().await? {
                let count = storage.count_locations(user.user_id).await?;
                println!("{}\t{}\t{count} location(s)", user.user_id.0, user.username);
            }
        }
        Command::ListLocations {
            user_id,
            limit,
            json,
        } => {
            let owner = known_user(&storage, user_id).await?;
            for location in storage.list_recent_locations(owner, limit).await? {
                if json {
                    println!("{}", serde_json::to_string(&location)?);
                } else {
                    println!(
                        "{}\t{}\t{}",
                        location.location_id.0,
                        location.point(),
                        location.created_at.to_rfc3339()
                    );
                }
            }
        }
        Command::ClearLocations { user_id } => {
            let owner = known_user(&storage, user_id).await?;
            let removed = storage.delete_all_locations(owner).await?;
            println!("removed {removed} location(s) for user_id={user_id}");
        }
    }

    Ok(())
}

async fn known_user(storage: &Storage, user_id: i64) -> Result<UserId> {
    let owner = UserId(user_id);
    match storage.username_for_user(owner).await? {
        Some(_) => Ok(owner),
        None => bail!("no user with id {user_id}"),
    }
}
