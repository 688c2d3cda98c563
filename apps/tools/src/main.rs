use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use shared::domain::{max_lesson_price, LessonId, NewLesson};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/booking.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upserts every lesson in a JSON array file.
    Seed { file: PathBuf },
    AddLesson {
        #[arg(long)]
        id: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        price: Decimal,
        #[arg(long)]
        space: u32,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    ListLessons,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Seed { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let lessons: Vec<NewLesson> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of lessons", file.display()))?;
            for lesson in &lessons {
                check_lesson(lesson)?;
            }
            for lesson in &lessons {
                storage.insert_lesson(lesson).await?;
            }
            println!("seeded {} lessons", lessons.len());
        }
        Command::AddLesson {
            id,
            topic,
            location,
            price,
            space,
            image,
            description,
        } => {
            let lesson = NewLesson {
                id: LessonId::new(id),
                topic,
                location,
                price,
                space,
                image,
                description,
            };
            check_lesson(&lesson)?;
            let stored = storage.insert_lesson(&lesson).await?;
            println!("stored lesson id={} space={}", stored.id, stored.space);
        }
        Command::ListLessons => {
            for lesson in storage.list_lessons().await? {
                println!(
                    "{}\t{}\t{}\tprice={}\tspace={}",
                    lesson.id, lesson.topic, lesson.location, lesson.price, lesson.space
                );
            }
        }
    }

    Ok(())
}

fn check_lesson(lesson: &NewLesson) -> Result<()> {
    if lesson.id.as_str().trim().is_empty() {
        bail!("lesson id must not be empty");
    }
    if lesson.price.is_sign_negative() {
        bail!("lesson {} has a negative price", lesson.id);
    }
    if lesson.price > max_lesson_price() {
        bail!(
            "lesson {} price {} exceeds {}",
            lesson.id,
            lesson.price,
            max_lesson_price()
        );
    }
    Ok(())
}
