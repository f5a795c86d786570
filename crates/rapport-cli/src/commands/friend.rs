use crate::cli::{FriendCommands, StoreArgs};
use crate::support::{acting_user_or_exit, exit_on_ledger_error, open_ledger_or_exit, print_json};
use rapport_ledger::{Edge, PublicProfile, UserId};
use serde_json::json;

pub fn run(command: FriendCommands) {
    match command {
        FriendCommands::List { acting, store } => run_list(acting, store),
        FriendCommands::Search {
            query,
            acting,
            store,
        } => run_search(query, acting, store),
        FriendCommands::Request {
            receiver,
            acting,
            store,
        } => run_request(receiver, acting, store),
        FriendCommands::Cancel {
            receiver,
            acting,
            store,
        } => run_cancel(receiver, acting, store),
        FriendCommands::Accept {
            sender,
            acting,
            store,
        } => run_accept(sender, acting, store),
        FriendCommands::Remove {
            friend,
            acting,
            store,
        } => run_remove(friend, acting, store),
        FriendCommands::Status {
            friend,
            acting,
            store,
        } => run_status(friend, acting, store),
    }
}

fn run_list(acting: String, store: StoreArgs) {
    let ledger = open_ledger_or_exit(&store);
    let user = acting_user_or_exit(&acting);
    let friends = ledger
        .list_friends(&user)
        .unwrap_or_else(|e| exit_on_ledger_error(e));

    if store.json {
        print_json(&json!({
            "action": "friend.list",
            "user": user,
            "count": friends.len(),
            "friends": friends
        }));
    } else {
        println!("rapport friend list\n  User: {user}\n  Count: {}", friends.len());
        print_profiles(&friends);
    }
}

fn run_search(query: String, acting: String, store: StoreArgs) {
    let ledger = open_ledger_or_exit(&store);
    let user = acting_user_or_exit(&acting);
    let friends = ledger
        .search_friends(&user, Some(&query))
        .unwrap_or_else(|e| exit_on_ledger_error(e));

    if store.json {
        print_json(&json!({
            "action": "friend.search",
            "user": user,
            "query": query,
            "count": friends.len(),
            "friends": friends
        }));
    } else {
        println!(
            "rapport friend search\n  User: {user}\n  Query: {query}\n  Matches: {}",
            friends.len()
        );
        print_profiles(&friends);
    }
}

fn run_request(receiver: String, acting: String, store: StoreArgs) {
    let ledger = open_ledger_or_exit(&store);
    let user = acting_user_or_exit(&acting);
    let receiver = UserId::parse(&receiver);
    let edge = ledger
        .send_request(&user, receiver.as_ref())
        .unwrap_or_else(|e| exit_on_ledger_error(e));
    report_edge("friend.request", "Requested", &edge, store.json);
}

fn run_cancel(receiver: String, acting: String, store: StoreArgs) {
    let ledger = open_ledger_or_exit(&store);
    let user = acting_user_or_exit(&acting);
    let receiver = UserId::parse(&receiver);
    let edge = ledger
        .cancel_request(&user, receiver.as_ref())
        .unwrap_or_else(|e| exit_on_ledger_error(e));
    report_edge("friend.cancel", "Canceled", &edge, store.json);
}

fn run_accept(sender: String, acting: String, store: StoreArgs) {
    let ledger = open_ledger_or_exit(&store);
    let user = acting_user_or_exit(&acting);
    let sender = UserId::parse(&sender);
    let edge = ledger
        .accept_request(&user, sender.as_ref())
        .unwrap_or_else(|e| exit_on_ledger_error(e));
    report_edge("friend.accept", "Accepted", &edge, store.json);
}

fn run_remove(friend: String, acting: String, store: StoreArgs) {
    let ledger = open_ledger_or_exit(&store);
    let user = acting_user_or_exit(&acting);
    let friend = UserId::parse(&friend);
    let edge = ledger
        .remove_friend(&user, friend.as_ref())
        .unwrap_or_else(|e| exit_on_ledger_error(e));
    report_edge("friend.remove", "Removed", &edge, store.json);
}

fn run_status(friend: String, acting: String, store: StoreArgs) {
    let ledger = open_ledger_or_exit(&store);
    let user = acting_user_or_exit(&acting);
    let friend_id = UserId::parse(&friend);
    let status = ledger
        .friendship_status(&user, friend_id.as_ref())
        .unwrap_or_else(|e| exit_on_ledger_error(e));
    let friend = friend_id.map(|id| id.to_string()).unwrap_or_default();

    if store.json {
        print_json(&json!({
            "action": "friend.status",
            "user": user,
            "friend": friend,
            "status": status
        }));
    } else {
        println!("rapport friend status\n  {user} <-> {friend}: {status}");
    }
}

fn report_edge(action: &str, verb: &str, edge: &Edge, json_output: bool) {
    if json_output {
        print_json(&json!({ "action": action, "edge": edge }));
    } else {
        println!(
            "rapport {}\n  {verb}: {} -> {} [{}]\n  Edge: {}",
            action.replace('.', " "),
            edge.sender,
            edge.receiver,
            edge.status,
            edge.id
        );
    }
}

fn print_profiles(profiles: &[PublicProfile]) {
    for profile in profiles {
        println!(
            "  - {} {} <{}>",
            profile.id, profile.full_name, profile.email
        );
    }
}
