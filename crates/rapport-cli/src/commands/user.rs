use crate::cli::UserCommands;
use crate::support::{open_store_or_exit, print_json};
use rapport_ledger::{ProfileDirectory, UserId, UserProfile};
use serde_json::json;

pub fn run(command: UserCommands) {
    match command {
        UserCommands::Add {
            id,
            name,
            email,
            avatar,
            password,
            store,
        } => run_add(id, name, email, avatar, password, store),
    }
}

fn run_add(
    id: String,
    name: String,
    email: String,
    avatar: String,
    password: String,
    args: crate::cli::StoreArgs,
) {
    let Some(user_id) = UserId::parse(&id) else {
        eprintln!("error: user id must not be empty");
        std::process::exit(1);
    };

    let (store, _) = open_store_or_exit(&args);
    let mut profile = UserProfile::new(user_id, name, email);
    profile.avatar = avatar;
    profile.password = password;
    let public = profile.to_public();

    let previous = store.upsert_profile(profile).unwrap_or_else(|e| {
        eprintln!("error: failed to save {}: {e}", store.path().display());
        std::process::exit(1);
    });

    if args.json {
        print_json(&json!({
            "action": "user.add",
            "storePath": store.path().display().to_string(),
            "replaced": previous.is_some(),
            "user": public
        }));
    } else {
        println!(
            "rapport user add\n  {}: {} <{}>\n  Path: {}",
            if previous.is_some() { "Replaced" } else { "Added" },
            public.id,
            public.email,
            store.path().display()
        );
    }
}
