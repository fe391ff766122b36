//! Default handler: decodes JSON commands and routes them to [`Server`].

use super::{CommandHandler, Inbound, Server};
use crate::client::ClientRef;
use crate::events::CoreEvent;
use crate::messages::{ClientCommand, ServerMessage};
use tracing::{debug, instrument};

/// Routes [`ClientCommand`]s to server operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCommandHandler;

#[async_trait::async_trait]
impl CommandHandler for JsonCommandHandler {
    #[instrument(skip_all, fields(client = %client.id()))]
    async fn handle(&self, server: &mut Server, client: &ClientRef, inbound: Inbound) {
        let bytes = match inbound {
            Inbound::Message(bytes) => bytes,
            Inbound::Closed => {
                server.disconnect(client).await;
                return;
            }
        };

        server.get_or_create_profile(client);
        let command = match ClientCommand::decode(&bytes) {
            Ok(command) => command,
            Err(e) => {
                server.events().emit(CoreEvent::BadMessage {
                    client: client.id(),
                    detail: e.to_string(),
                });
                server.reply(client, &ServerMessage::error("Bad message", e.to_string()));
                return;
            }
        };
        debug!(command = ?command, "Routing command");

        match command {
            ClientCommand::Nick { nick } => {
                server.set_nick(client, &nick).await;
                server.notify_lobby();
            }
            ClientCommand::Create => {
                if server.create_game(client).await.is_some() {
                    server.notify_lobby();
                }
            }
            ClientCommand::Join { id } => {
                server.join_game(&id, client).await;
            }
            ClientCommand::Start => server.start_game(client).await,
            ClientCommand::Move(description) => server.move_piece(client, description).await,
            ClientCommand::Seat { seat } => server.change_seat(client, seat).await,
            ClientCommand::List => server.send_list(client),
        }
    }
}
