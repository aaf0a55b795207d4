use bot_param::transport::PARAM_UPDATE_CHANNEL;
use bot_param::{ClientConfig, MemoryTransport, ParamClient, ParamRequest, ParamStore};
use std::sync::Arc;

fn main() {
    let config_text = r#"
        robot {
            name = "rover";
            rate = 50;
            wheels = [front_left, front_right, rear_left, rear_right];
            arm { reach = 0.85; }
        }
    "#;

    // Stand in for a param server on the same process.
    let server = match ParamStore::from_str(config_text) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Failed to parse params: {:?}", miette::Report::new(e));
            return;
        }
    };
    let transport = Arc::new(MemoryTransport::new());
    let published = Arc::clone(&server);
    transport.set_responder(Arc::new(move |t: &MemoryTransport, _: &str, _: &ParamRequest| {
        t.deliver(PARAM_UPDATE_CHANNEL, &published.snapshot(1, 1));
    }));

    let client = match ParamClient::from_server(transport, true, &ClientConfig::default()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to reach the param server: {:?}", miette::Report::new(e));
            return;
        }
    };

    // `rate` is inherited by robot.arm from robot.
    println!("arm rate: {:?}", client.get_int("robot.arm.rate"));
    println!("wheels: {:?}", client.get_str_array("robot.wheels"));
    match client.to_json() {
        Ok(json) => println!("params as JSON:\n{json}"),
        Err(e) => eprintln!("Failed to serialize params: {e}"),
    }
}
