pub mod http;

pub use http::{
    get_current_block, get_transactions, router, subscribe, AddressQuery, ApiServer, AppState,
    CurrentBlockResponse, ErrorResponse, SubscribeResponse,
};
