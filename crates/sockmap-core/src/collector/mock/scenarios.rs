//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic `/proc` states for testing the
//! tracer under various system conditions. The "typical" system has
//! three processes (init, sshd, nginx), five sockets including one
//! orphaned TIME_WAIT entry, and classified memory maps.

use super::filesystem::MockFs;

// Socket inodes used throughout the typical scenario.
const SSHD_TCP_INODE: u64 = 10001;
const NGINX_ESTABLISHED_INODE: u64 = 10002;
const NGINX_CLOSE_WAIT_INODE: u64 = 10003;
const SSHD_UDP_INODE: u64 = 10004;

impl MockFs {
    /// Creates a typical small system.
    ///
    /// Sockets: an sshd listener on 127.0.0.1:22, an established and a
    /// CLOSE_WAIT nginx connection on port 8080, an orphaned TIME_WAIT
    /// entry (inode 0), and one bound UDP socket.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/uptime", "12345.67 98765.43\n");

        fs.add_file(
            "/proc/net/tcp",
            "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
             \x20  0: 0100007F:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 10001 1 0000000000000000 100 0 0 10 0\n\
             \x20  1: 0100007F:1F90 0100007F:D431 01 00000000:00000000 00:00000000 00000000    33        0 10002 1 0000000000000000 20 4 30 10 -1\n\
             \x20  2: 0100007F:1F90 0100007F:D432 08 00000000:00000000 00:00000000 00000000    33        0 10003 1 0000000000000000 20 4 30 10 -1\n\
             \x20  3: 0100007F:1F90 0100007F:D433 06 00000000:00000000 03:00000DFC 00000000     0        0 0 3 0000000000000000\n",
        );
        fs.add_file(
            "/proc/net/udp",
            "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops\n\
             \x20  0: 00000000:0044 00000000:0000 07 00000000:00000000 00:00000000 00000000     0        0 10004 2 0000000000000000 0\n",
        );

        fs.add_typical_process(
            1,
            "init",
            'S',
            "VmRSS:\t    1024 kB\nVmData:\t     512 kB\n",
            100,
            1,
        );
        fs.add_file(
            "/proc/1/maps",
            "00400000-00480000 r-xp 00000000 08:01 101 /sbin/init\n\
             00680000-00690000 rw-p 00080000 08:01 101 /sbin/init\n\
             7ffe00000000-7ffe00021000 rw-p 00000000 00:00 0 [stack]\n",
        );
        fs.add_dir("/proc/1/fd");
        fs.add_symlink("/proc/1/fd/0", "/dev/null");

        fs.add_typical_process(
            100,
            "sshd",
            'S',
            "VmRSS:\t    5120 kB\nVmData:\t    2048 kB\n",
            400,
            1_224_567,
        );
        fs.add_file(
            "/proc/100/maps",
            "00400000-00500000 r-xp 00000000 08:01 202 /usr/sbin/sshd\n\
             00700000-00740000 rw-p 00100000 08:01 202 /usr/sbin/sshd\n\
             01000000-01100000 rw-p 00000000 00:00 0 [heap]\n\
             7ffd00000000-7ffd00021000 rw-p 00000000 00:00 0 [stack]\n",
        );
        fs.add_symlink("/proc/100/fd/0", "/dev/null");
        fs.add_symlink("/proc/100/fd/3", format!("socket:[{}]", SSHD_TCP_INODE));
        fs.add_symlink("/proc/100/fd/4", format!("socket:[{}]", SSHD_UDP_INODE));

        fs.add_typical_process(
            200,
            "nginx",
            'S',
            "VmRSS:\t   51200 kB\nVmData:\t   10240 kB\n",
            2000,
            1_000_000,
        );
        fs.add_file(
            "/proc/200/maps",
            "00400000-00500000 r-xp 00000000 08:01 303 /usr/sbin/nginx\n\
             00600000-00700000 rw-p 00100000 08:01 303 /usr/sbin/nginx\n\
             01000000-01200000 rw-p 00000000 00:00 0 [heap]\n\
             7f0000000000-7f0000100000 rw-s 00000000 08:02 404 /dev/shm/nginx-cache\n\
             7ffd00000000-7ffd00021000 rw-p 00000000 00:00 0 [stack]\n\
             7fff00000000-7fff00001000 r--p 00000000 00:00 0 [vvar]\n",
        );
        fs.add_symlink(
            "/proc/200/fd/5",
            format!("socket:[{}]", NGINX_ESTABLISHED_INODE),
        );
        fs.add_symlink(
            "/proc/200/fd/6",
            format!("socket:[{}]", NGINX_CLOSE_WAIT_INODE),
        );

        fs
    }

    /// Typical system where one process's memory map is unreadable
    /// (as if the process exited mid-scan).
    pub fn with_unreadable_maps(pid: u32) -> Self {
        let mut fs = Self::typical_system();
        fs.remove_file(format!("/proc/{}/maps", pid));
        fs
    }

    /// Typical system with the primary socket table missing, simulating
    /// a permission failure on `/proc/net/tcp`.
    pub fn without_socket_table() -> Self {
        let mut fs = Self::typical_system();
        fs.remove_file("/proc/net/tcp");
        fs
    }

    /// A system containing a zombie process (pid 4000).
    pub fn with_zombie_process() -> Self {
        let mut fs = Self::typical_system();
        fs.add_file(
            "/proc/4000/stat",
            "4000 (defunct) Z 1 4000 4000 0 -1 4227084 0 0 0 0 0 0 0 0 20 0 1 0 900000 0 0 18446744073709551615",
        );
        fs.add_file("/proc/4000/status", "Name:\tdefunct\nState:\tZ (zombie)\n");
        fs.add_file("/proc/4000/comm", "defunct\n");
        fs
    }

    fn add_typical_process(
        &mut self,
        pid: u32,
        comm: &str,
        state: char,
        status: &str,
        cpu_ticks: u64,
        starttime: u64,
    ) {
        let stat = format!(
            "{pid} ({comm}) {state} 0 {pid} {pid} 0 -1 4194304 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 {starttime} 10000000 500 18446744073709551615",
            pid = pid,
            comm = comm,
            state = state,
            utime = cpu_ticks / 2,
            stime = cpu_ticks - cpu_ticks / 2,
            starttime = starttime,
        );
        self.add_file(format!("/proc/{}/stat", pid), stat);
        self.add_file(format!("/proc/{}/status", pid), status);
        self.add_file(format!("/proc/{}/comm", pid), format!("{}\n", comm));
    }
}
