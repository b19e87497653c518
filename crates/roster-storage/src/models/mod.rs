mod record;
mod staff;
mod subject;

pub use record::Record;
pub use staff::Staff;
pub use subject::Subject;
