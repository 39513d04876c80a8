pub mod messagemodel;
pub mod ticketmodel;
pub mod usermodel;
