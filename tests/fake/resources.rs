use kfn_operator::model::function_config::DefaultOverlay;
use kfn_operator::model::spec::{Function, FunctionSpec};

pub fn function(namespace: &str, name: &str, image: &str, replicas: i32) -> Function {
    let mut function = Function::new(name, FunctionSpec {
        image: String::from(image),
        replicas,
        class: String::from("Copy"),
        input: String::from("in"),
        input_key_deserializer: String::from("bytes"),
        input_value_deserializer: String::from("bytes"),
        output: String::from("out"),
        output_key_serializer: String::from("bytes"),
        output_value_serializer: String::from("bytes"),
        function_config: None,
        consumer_config: None,
        producer_config: None,
    });
    function.metadata.namespace = Some(String::from(namespace));
    function.metadata.uid = Some(format!("{namespace}-{name}-uid"));
    function.metadata.generation = Some(1);
    function
}

pub fn overlay(bootstrap_servers: &str) -> DefaultOverlay {
    DefaultOverlay {
        bootstrap_servers: String::from(bootstrap_servers),
        ..DefaultOverlay::default()
    }
}
