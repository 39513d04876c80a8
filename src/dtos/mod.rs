pub mod messagedtos;
pub mod ticketdtos;
pub mod userdtos;

pub use messagedtos::*;
pub use ticketdtos::*;
pub use userdtos::*;
