//! Integration harness: scripted feeds driving the trader, the live-loop
//! step, persistence and the control API together.

mod mock_feed;
mod simulation;
