//! Core model of the travel-planning chat: messages, conversations,
//! itineraries and the pure functions that shape backend replies into them.

pub mod attachment;
pub mod conversation;
pub mod ids;
pub mod itinerary;
pub mod message;
pub mod reply;
pub mod storage;
pub mod title;
