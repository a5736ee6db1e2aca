pub mod api_client;
pub mod error;
pub mod generation_service;
pub mod message_store;
pub mod title_generator;
pub mod utf8_decoder;

pub use api_client::ApiClient;
pub use error::{ServiceError, ServiceResult};
pub use generation_service::{
    GenerationRequest, GenerationService, HttpGenerationService, TextStream,
};
pub use message_store::{HttpMessageStore, MessageStore, reconcile_ids};
pub use title_generator::{HttpTitleService, TitleRequest, TitleService, clean_title};
pub use utf8_decoder::Utf8ChunkDecoder;
