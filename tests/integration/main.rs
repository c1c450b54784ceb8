mod json_server;
mod session_lifecycle;
mod test_utils;
