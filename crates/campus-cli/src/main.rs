use anyhow::{Context, bail};
use campus_cli::seeder::{self, SeedConfig};
use campus_core::{Role, hash_password};
use campus_db::init_db_pool;
use campus_models::{Email, UserId};
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "campus-cli")]
#[command(about = "Campus CLI - Administrative tools for Campus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an administrator account
    CreateAdmin {
        /// Full name of the administrator
        #[arg(short = 'n', long)]
        full_name: Option<String>,

        /// Email address
        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Password (prompted securely if not provided)
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
    /// Seed the database with fake teachers, students and courses
    Seed {
        #[arg(long, default_value = "5")]
        teachers: usize,

        #[arg(long, default_value = "50")]
        students: usize,

        #[arg(long, default_value = "10")]
        courses: usize,
    },
    /// Remove all seeded data (real accounts are kept)
    ClearSeed,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("\n❌ {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let pool = init_db_pool(5)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::CreateAdmin {
            full_name,
            email,
            password,
        } => handle_create_admin(&pool, full_name, email, password).await,
        Commands::Seed {
            teachers,
            students,
            courses,
        } => seeder::seed_all(&pool, SeedConfig::new(teachers, students, courses)).await,
        Commands::ClearSeed => seeder::clear_all(&pool).await,
    }
}

async fn handle_create_admin(
    pool: &PgPool,
    full_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> anyhow::Result<()> {
    let full_name = match full_name {
        Some(name) => name,
        None => Input::new()
            .with_prompt("Full name")
            .interact_text()
            .context("Failed to read full name")?,
    };

    let email = match email {
        Some(email) => email,
        None => Input::new()
            .with_prompt("Email address")
            .interact_text()
            .context("Failed to read email")?,
    };
    let email = Email::new(email).context("Invalid email address")?;

    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()
            .context("Failed to read password")?,
    };
    if password.len() < 8 {
        bail!("Password must be at least 8 characters");
    }

    create_admin(pool, full_name.trim(), &email, &password).await?;

    println!("\n✅ Administrator created successfully!");
    println!("   Email: {email}");
    println!("   Name: {}", full_name.trim());
    Ok(())
}

async fn create_admin(
    db: &PgPool,
    full_name: &str,
    email: &Email,
    password: &str,
) -> anyhow::Result<UserId> {
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("{}", e.error))?;

    let user_id: Option<UserId> = sqlx::query_scalar(
        "INSERT INTO users (full_name, email, password_hash, role)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT DO NOTHING
         RETURNING id",
    )
    .bind(full_name)
    .bind(email.as_str())
    .bind(&password_hash)
    .bind(Role::Admin)
    .fetch_optional(db)
    .await
    .context("Failed to insert administrator")?;

    user_id.context("A user with this email already exists")
}
