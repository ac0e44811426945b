pub mod influx_server;
