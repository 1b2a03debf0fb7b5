//! crates/chatbot_builder_core/src/schema.rs
//!
//! The closed set of tables the datastore gateway may touch, with their column
//! whitelists and foreign-key relationships. Adapters build queries only from
//! these names, never from client input.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Chatbots,
    Sources,
    Conversations,
    Messages,
    Integrations,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Chatbots,
        Table::Sources,
        Table::Conversations,
        Table::Messages,
        Table::Integrations,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Chatbots => "chatbots",
            Table::Sources => "sources",
            Table::Conversations => "conversations",
            Table::Messages => "messages",
            Table::Integrations => "integrations",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Chatbots => &[
                "id",
                "owner_account_id",
                "name",
                "description",
                "welcome_message",
                "instructions",
                "avatar_url",
                "primary_color",
                "model_name",
                "temperature",
                "is_public",
                "max_tokens",
                "created_at",
                "updated_at",
            ],
            Table::Sources => &[
                "id",
                "chatbot_id",
                "name",
                "type",
                "content",
                "file_url",
                "web_url",
                "status",
                "error_message",
                "created_at",
                "updated_at",
            ],
            Table::Conversations => &[
                "id",
                "chatbot_id",
                "account_id",
                "visitor_id",
                "title",
                "is_active",
                "metadata",
                "created_at",
                "updated_at",
            ],
            Table::Messages => &[
                "id",
                "conversation_id",
                "role",
                "content",
                "sources",
                "created_at",
            ],
            Table::Integrations => &[
                "id",
                "chatbot_id",
                "type",
                "settings",
                "is_active",
                "created_at",
                "updated_at",
            ],
        }
    }

    pub fn has_column(self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// The foreign key that attaches a row of this table to its owning row.
    pub fn parent(self) -> Option<(&'static str, Table)> {
        match self {
            Table::Chatbots => None,
            Table::Sources | Table::Conversations | Table::Integrations => {
                Some(("chatbot_id", Table::Chatbots))
            }
            Table::Messages => Some(("conversation_id", Table::Conversations)),
        }
    }

    /// Tables whose rows are removed together with a row of this table.
    pub fn cascades_to(self) -> Vec<(Table, &'static str)> {
        Table::ALL
            .into_iter()
            .filter_map(|child| match child.parent() {
                Some((fk, parent)) if parent == self => Some((child, fk)),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleting_a_chatbot_cascades_to_its_children() {
        let children: Vec<Table> =
            Table::Chatbots.cascades_to().into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            children,
            vec![Table::Sources, Table::Conversations, Table::Integrations]
        );
        assert_eq!(
            Table::Conversations.cascades_to(),
            vec![(Table::Messages, "conversation_id")]
        );
        assert!(Table::Messages.cascades_to().is_empty());
    }

    #[test]
    fn every_table_has_an_id_and_creation_time() {
        for table in Table::ALL {
            assert!(table.has_column("id"), "{table} lacks id");
            assert!(table.has_column("created_at"), "{table} lacks created_at");
        }
        assert!(!Table::Messages.has_column("updated_at"));
    }
}
