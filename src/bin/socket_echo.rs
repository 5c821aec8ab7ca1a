//! Socket 回显实验
//!
//! 客户端与服务器之间建立可靠 socket，客户端逐 tick 发送若干消息，服务器原样回显。
//! 可以在指定 tick 剪断服务器网线，观察客户端通过保活超时断开连接。

use clap::Parser;
use serde::Serialize;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use vnet_sim::net::{ComputerId, NetWorld, Stats};
use vnet_sim::proto::{Socket, SocketHost, SocketId, SocketState};
use vnet_sim::sim::{ScenarioSpec, Simulator, Tick};
use vnet_sim::topo::two_tier::{TwoTierOpts, build_two_tier_world};

#[derive(Debug, Parser)]
#[command(name = "socket-echo", about = "分层虚拟网络上的 socket 回显仿真")]
struct Args {
    /// 场景 JSON；不填则使用内置两层拓扑
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// 内置拓扑的办公室数量
    #[arg(long, default_value_t = 2)]
    offices: usize,

    /// 内置拓扑每个办公室的设备数量
    #[arg(long, default_value_t = 2)]
    devices_per_office: usize,

    /// 客户端计算机名称
    #[arg(long, default_value = "pc0-0")]
    client: String,

    /// 服务器计算机名称
    #[arg(long, default_value = "pc1-0")]
    server: String,

    #[arg(long, default_value_t = 5000)]
    client_port: u16,

    #[arg(long, default_value_t = 80)]
    server_port: u16,

    /// 客户端发送的消息数量
    #[arg(long, default_value_t = 4)]
    messages: u32,

    /// 仿真运行到多少 tick
    #[arg(long, default_value_t = 300)]
    until_ticks: u64,

    /// 在该 tick 把服务器从网络中移除（剪断网线）
    #[arg(long)]
    unplug_server_at: Option<u64>,

    /// 把最终拓扑写成 JSON
    #[arg(long)]
    dump_topology: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summary {
    tick: u64,
    client_state: String,
    server_state: String,
    sent: u32,
    echoed: Vec<Value>,
    stats: Stats,
}

fn state_label(world: &NetWorld, computer: ComputerId, socket: SocketId) -> String {
    match world.computer(computer).and_then(|c| c.net_module().socket(socket)) {
        Some(s) => match s.state() {
            SocketState::Disconnected => "disconnected",
            SocketState::Connecting => "connecting",
            SocketState::Connected => "connected",
        }
        .to_string(),
        None => "closed".to_string(),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut world = match &args.scenario {
        Some(path) => ScenarioSpec::from_path(path)?.build()?,
        None => {
            let mut world = NetWorld::default();
            let opts = TwoTierOpts {
                offices: args.offices,
                devices_per_office: args.devices_per_office,
            };
            build_two_tier_world(&mut world, &opts)?;
            world
        }
    };

    let client = world
        .computer_by_name(&args.client)
        .ok_or_else(|| format!("unknown client computer `{}`", args.client))?;
    let server = world
        .computer_by_name(&args.server)
        .ok_or_else(|| format!("unknown server computer `{}`", args.server))?;
    let client_addr = world
        .address_of(client, args.client_port)
        .ok_or("client has no network address")?;
    let server_addr = world
        .address_of(server, args.server_port)
        .ok_or("server has no network address")?;

    let mut sim = Simulator::default();
    world.start(&mut sim);

    // 服务器：等待来自客户端的握手，原样回显
    let server_socket = world
        .with_net_module(&mut sim, server, |net, _| -> Result<SocketId, Box<dyn Error>> {
            let id = net.create_socket();
            net.bind(id, args.server_port)?;
            net.set_destination(id, client_addr.clone())?;
            net.add_packet_handler(
                id,
                Box::new(|socket: &mut Socket, host: &mut dyn SocketHost, data: &Value| {
                    socket.send(host, data.clone());
                }),
            )?;
            Ok(id)
        })
        .ok_or("server computer vanished")??;

    // 客户端：记录收到的回显
    let echoed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&echoed);
    let client_socket = world
        .with_net_module(&mut sim, client, |net, nic| -> Result<SocketId, Box<dyn Error>> {
            let id = net.create_socket();
            net.bind(id, args.client_port)?;
            net.set_destination(id, server_addr.clone())?;
            net.add_packet_handler(
                id,
                Box::new(move |_: &mut Socket, _: &mut dyn SocketHost, data: &Value| {
                    sink.borrow_mut().push(data.clone());
                }),
            )?;
            net.connect(id, nic)?;
            Ok(id)
        })
        .ok_or("client computer vanished")??;

    let mut sent = 0u32;
    for t in 1..=args.until_ticks {
        sim.run_until(Tick(t), &mut world);

        if args.unplug_server_at == Some(t) {
            if let Some(device) = world.computer(server).map(|c| c.device()) {
                world.topology.remove_net_node(device)?;
                eprintln!("unplugged server at tick {t}");
            }
        }

        let connected = world
            .computer(client)
            .and_then(|c| c.net_module().socket(client_socket))
            .is_some_and(|s| s.state() == SocketState::Connected);
        if connected && sent < args.messages {
            let msg = json!({ "seq": sent, "body": format!("hello #{sent}") });
            world
                .with_net_module(&mut sim, client, |net, nic| net.send_data(client_socket, nic, msg))
                .transpose()?;
            sent += 1;
        }
    }

    if let Some(path) = &args.dump_topology {
        fs::write(path, serde_json::to_string_pretty(&world.topology)?)?;
        eprintln!("wrote topology to {}", path.display());
    }

    let summary = Summary {
        tick: sim.now().0,
        client_state: state_label(&world, client, client_socket),
        server_state: state_label(&world, server, server_socket),
        sent,
        echoed: echoed.borrow().clone(),
        stats: world.stats.clone(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
