pub mod chat;
pub mod crud;
pub mod domain;
pub mod error;
pub mod payload;
pub mod policy;
pub mod ports;
pub mod resources;
pub mod schema;

pub use chat::{ChatReply, ChatRequest, ChatService};
pub use crud::CrudService;
pub use domain::{
    Account, AccountCredentials, AuthSession, Caller, Chatbot, Conversation, Integration,
    IntegrationType, Message, MessageRole, Source, SourceStatus, SourceType,
};
pub use error::{ServiceError, ServiceResult};
pub use policy::{authorize, Action, Decision, Guard, ResourceKind};
pub use ports::{
    AccountStore, Datastore, Filter, FilterValue, Order, PortError, PortResult, Record,
    ReplyService,
};
pub use resources::{Parent, Resource};
pub use schema::Table;
