mod latency;
mod sim;
