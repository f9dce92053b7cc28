use anyhow::Result;
use clap::Parser;
use registroscmd::cli::{
    run_add, run_browse, run_config, run_delete, run_edit, run_export, run_history, run_import,
    forget_rejected_session, run_list, run_login, run_logout, run_show, run_values, run_whoami, ui,
    App, Cli, Commands,
};
use registroscmd::db::Database;
use registroscmd::logging;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli.command) {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let db = Database::open()?;
    let mut app = App::open(db)?;

    let result = dispatch(&mut app, command);
    if let Err(e) = &result {
        // A rejected token is dead; forget it so the next run asks for login.
        forget_rejected_session(&mut app, e);
    }
    result
}

fn dispatch(app: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::Login(args) => run_login(app, args),
        Commands::Logout => run_logout(app),
        Commands::Whoami => run_whoami(app),
        Commands::List(args) => run_list(app, args),
        Commands::Browse(args) => run_browse(app, args),
        Commands::Show(args) => run_show(app, args),
        Commands::History(args) => run_history(app, args),
        Commands::Add(args) => run_add(app, args),
        Commands::Edit(args) => run_edit(app, args),
        Commands::Delete(args) => run_delete(app, args),
        Commands::Import(args) => run_import(app, args),
        Commands::Export(args) => run_export(app, args),
        Commands::Values(args) => run_values(app, args),
        Commands::Config(args) => run_config(app, args),
    }
}
