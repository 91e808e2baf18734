pub fn run(host: &str, port: u16, threads: Option<usize>) {
    let base = format!("http://{host}:{port}");

    println!("randsuite server v{}", randsuite_core::VERSION);
    println!("   {base}");
    println!();
    println!("   Endpoints:");
    println!("     GET  /                API index (try: curl {base})");
    println!("     GET  /health          Health check");
    println!("     GET  /api/v1/tests    Test catalog with default parameters");
    println!("     POST /api/v1/run      Run a selection of tests on an input");
    println!();
    println!("   Example:");
    println!(
        "     curl -X POST {base}/api/v1/run -H 'content-type: application/json' \\"
    );
    println!("          -d '{{\"text\": \"hello world\", \"tests\": [\"runs\", \"gap\"]}}'");
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => super::fail(&randsuite_core::Error::from(e)),
    };
    if let Err(e) = rt.block_on(randsuite_server::run_server(host, port, threads)) {
        eprintln!("Server error on {host}:{port}: {e}");
        std::process::exit(1);
    }
}
